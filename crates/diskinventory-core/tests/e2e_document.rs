/// End-to-end document tests.
///
/// Each test scans a real temporary folder, installs the result into a
/// `Document` (the document is itself the scan observer), then drives the
/// mutations a frontend would issue and checks tree, statistics, zoom,
/// selection and the published events. The trash is a fake that deletes
/// from the temp folder, so nothing reaches the user's real trash.
use diskinventory_core::document::{Document, DocumentEvent, ViewOption};
use diskinventory_core::error::ErrorKind;
use diskinventory_core::model::{EntryKind, FsTree, NodeIndex};
use diskinventory_core::platform::TrashCan;
use diskinventory_core::scanner::{ScanOptions, ScanState, Scanner};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────────────

/// ```text
/// root/
///   a.txt     (100 bytes)
///   b.txt     (200 bytes)
///   sub/
///     c.txt   (50 bytes)
/// ```
fn build_test_tree(root: &Path) {
    write_bytes(&root.join("a.txt"), 100);
    write_bytes(&root.join("b.txt"), 200);
    fs::create_dir(root.join("sub")).unwrap();
    write_bytes(&root.join("sub").join("c.txt"), 50);
}

fn write_bytes(path: &Path, n: usize) {
    let mut f = fs::File::create(path).unwrap();
    f.write_all(&vec![0u8; n]).unwrap();
}

/// Deletes from disk and remembers what it was given.
#[derive(Clone, Default)]
struct FakeTrash {
    trashed: Arc<Mutex<Vec<PathBuf>>>,
}

impl TrashCan for FakeTrash {
    fn move_to_trash(&self, path: &Path) -> io::Result<()> {
        if fs::symlink_metadata(path)?.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
        self.trashed.lock().push(path.to_path_buf());
        Ok(())
    }
}

struct BrokenTrash;

impl TrashCan for BrokenTrash {
    fn move_to_trash(&self, _path: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "trash is full"))
    }
}

/// Strips every permission from a folder for the guard's lifetime.
#[cfg(unix)]
struct LockedFolder(PathBuf);

#[cfg(unix)]
impl LockedFolder {
    /// `None` when permissions are not enforced (running as root), in which
    /// case the caller skips the test.
    fn new(dir: &Path) -> Option<Self> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o000)).unwrap();
        let guard = Self(dir.to_path_buf());
        if fs::read_dir(dir).is_ok() {
            eprintln!("permissions not enforced; skipping");
            return None;
        }
        Some(guard)
    }
}

#[cfg(unix)]
impl Drop for LockedFolder {
    fn drop(&mut self) {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(&self.0, fs::Permissions::from_mode(0o755));
    }
}

fn scanned_document(root: &Path, options: ScanOptions, trash: impl TrashCan + 'static) -> Document {
    let mut document = Document::with_trash(options, trash);
    let mut scanner = Scanner::new(root, options);
    scanner.start().unwrap();
    assert_eq!(scanner.wait(&mut document), ScanState::Finished);
    document
}

fn tree(document: &Document) -> &FsTree {
    document.tree().expect("document holds a tree")
}

fn child_named(document: &Document, parent: NodeIndex, name: &str) -> NodeIndex {
    let tree = tree(document);
    tree.children(parent)
        .iter()
        .copied()
        .find(|&c| tree.name(c) == name)
        .unwrap_or_else(|| panic!("no child named {name}"))
}

fn root(document: &Document) -> NodeIndex {
    document.root_item().expect("document has a root")
}

fn text_stats(document: &Document) -> Option<(usize, u64)> {
    document
        .kind_statistic_for_kind("Plain Text Document")
        .map(|s| (s.file_count(), s.size()))
}

fn drain(events: &Receiver<DocumentEvent>) -> Vec<DocumentEvent> {
    events.try_iter().collect()
}

fn assert_consistent(document: &Document) {
    let tree = tree(document);
    assert!(tree.size_invariant_holds(), "folder sizes drifted");
    assert!(document.kind_index().is_consistent(tree), "kind totals drifted");
}

// ── Trash ─────────────────────────────────────────────────────────────────────

/// Trashing a file shrinks every ancestor and its kind, leaves unrelated
/// nodes where they were, and publishes one `ItemsChanged`.
#[test]
fn trash_updates_sizes_and_statistics() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());
    let trash = FakeTrash::default();
    let mut document = scanned_document(tmp.path(), ScanOptions::default(), trash.clone());
    let events = document.subscribe();

    let root = root(&document);
    let a = child_named(&document, root, "a.txt");
    let b = child_named(&document, root, "b.txt");
    let sub = child_named(&document, root, "sub");
    assert_eq!(text_stats(&document), Some((3, 350)));

    document.move_to_trash(b).unwrap();

    assert_eq!(tree(&document).size(root), 150);
    assert_eq!(text_stats(&document), Some((2, 150)));
    assert_eq!(tree(&document).name(a), "a.txt");
    assert_eq!(tree(&document).size(sub), 50);
    assert!(!tree(&document).contains(b));
    assert_eq!(*trash.trashed.lock(), [tmp.path().join("b.txt")]);
    assert_eq!(drain(&events), [DocumentEvent::ItemsChanged]);
    assert_consistent(&document);
}

/// A refused trash leaves tree, statistics and events untouched.
#[test]
fn failed_trash_rolls_back() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());
    let mut document = scanned_document(tmp.path(), ScanOptions::default(), BrokenTrash);
    let events = document.subscribe();

    let root = root(&document);
    let sub = child_named(&document, root, "sub");
    let err = document.move_to_trash(sub).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TrashFailed);

    assert_eq!(tree(&document).size(root), 350);
    assert_eq!(text_stats(&document), Some((3, 350)));
    assert!(drain(&events).is_empty());
    assert!(tmp.path().join("sub").join("c.txt").exists());
    assert_consistent(&document);
}

/// Trashing the zoomed folder zooms back out and clears a selection inside
/// it, all carried by the single `ItemsChanged`.
#[test]
fn trash_invalidates_zoom_and_selection() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());
    let mut document = scanned_document(tmp.path(), ScanOptions::default(), FakeTrash::default());

    let root = root(&document);
    let sub = child_named(&document, root, "sub");
    let c = child_named(&document, sub, "c.txt");
    document.zoom_into(sub).unwrap();
    document.set_selected(Some(c)).unwrap();

    let events = document.subscribe();
    document.move_to_trash(sub).unwrap();

    assert_eq!(document.zoom_stack(), &[root]);
    assert_eq!(document.selected(), None);
    assert_eq!(drain(&events), [DocumentEvent::ItemsChanged]);
    assert!(document.kind_statistic_for_item(c).is_none());
    assert_eq!(text_stats(&document), Some((2, 300)));
}

// ── Refresh ───────────────────────────────────────────────────────────────────

/// Refreshing a folder rescans only that folder and applies the delta.
#[test]
fn refresh_folder_picks_up_changes() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());
    let mut document = scanned_document(tmp.path(), ScanOptions::default(), FakeTrash::default());

    let root = root(&document);
    let a = child_named(&document, root, "a.txt");
    let sub = child_named(&document, root, "sub");
    document.zoom_into(sub).unwrap();
    document.set_selected(Some(sub)).unwrap();

    write_bytes(&tmp.path().join("sub").join("c.txt"), 80);
    write_bytes(&tmp.path().join("sub").join("d.txt"), 5);

    let events = document.subscribe();
    document.refresh(sub).unwrap();

    let new_sub = child_named(&document, root, "sub");
    assert_eq!(tree(&document).size(new_sub), 85);
    assert_eq!(tree(&document).size(root), 385);
    assert_eq!(tree(&document).size(a), 100);
    assert_eq!(text_stats(&document), Some((4, 385)));
    assert_eq!(document.zoom_stack(), &[root, new_sub]);
    assert_eq!(document.selected(), Some(new_sub));
    assert_eq!(drain(&events), [DocumentEvent::ItemsChanged]);
    assert_consistent(&document);
}

/// Refreshing an item that vanished from disk removes it.
#[test]
fn refresh_of_vanished_item_removes_it() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());
    let mut document = scanned_document(tmp.path(), ScanOptions::default(), FakeTrash::default());

    let root = root(&document);
    let b = child_named(&document, root, "b.txt");
    fs::remove_file(tmp.path().join("b.txt")).unwrap();

    let events = document.subscribe();
    document.refresh(b).unwrap();
    assert!(!tree(&document).contains(b));
    assert_eq!(tree(&document).size(root), 150);
    assert_eq!(drain(&events), [DocumentEvent::ItemsChanged]);
    assert_consistent(&document);
}

/// Refreshing the root swaps in a whole new tree and resets zoom to it.
#[test]
fn refresh_root_replaces_everything() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());
    let mut document = scanned_document(tmp.path(), ScanOptions::default(), FakeTrash::default());

    let old_root = root(&document);
    let sub = child_named(&document, old_root, "sub");
    document.zoom_into(sub).unwrap();
    write_bytes(&tmp.path().join("e.png"), 40);

    let events = document.subscribe();
    document.refresh(old_root).unwrap();

    let new_root = root(&document);
    assert_ne!(new_root, old_root);
    assert_eq!(tree(&document).size(new_root), 390);
    assert_eq!(document.zoom_stack(), &[new_root]);
    assert_eq!(
        document.kind_statistic_for_kind("PNG Image").map(|s| s.size()),
        Some(40)
    );
    assert_eq!(drain(&events), [DocumentEvent::ItemsChanged]);
    assert_consistent(&document);
}

/// A scanned folder named like a package stays open when the root is
/// refreshed.
#[test]
fn refresh_of_a_package_root_keeps_it_open() {
    let tmp = TempDir::new().unwrap();
    let app = tmp.path().join("Tool.app");
    fs::create_dir(&app).unwrap();
    build_test_tree(&app);
    let mut document = scanned_document(&app, ScanOptions::default(), FakeTrash::default());
    assert_eq!(tree(&document).child_count(root(&document)), 3);

    write_bytes(&app.join("d.txt"), 8);
    document.refresh(root(&document)).unwrap();

    let root = root(&document);
    assert_eq!(
        tree(&document).entry_kind(root),
        Some(EntryKind::Package { expanded: true })
    );
    assert_eq!(tree(&document).child_count(root), 4);
    assert_eq!(tree(&document).size(root), 358);
    assert_eq!(text_stats(&document), Some((4, 358)));
    assert!(document.kind_statistic_for_kind("Application").is_none());
    assert_consistent(&document);
}

// ── View options ──────────────────────────────────────────────────────────────

/// Toggling package contents swaps opaque packages for expanded ones and
/// back, keeping sizes and publishing one event per change.
#[test]
fn package_contents_toggle() {
    let tmp = TempDir::new().unwrap();
    let app = tmp.path().join("Viewer.app");
    fs::create_dir_all(app.join("Contents")).unwrap();
    write_bytes(&app.join("Contents").join("notes.txt"), 300);
    write_bytes(&tmp.path().join("readme.txt"), 10);

    let mut document = scanned_document(tmp.path(), ScanOptions::default(), FakeTrash::default());
    let events = document.subscribe();
    let root = root(&document);
    let package = child_named(&document, root, "Viewer.app");
    assert!(!document.is_node(package));
    assert_eq!(text_stats(&document), Some((1, 10)));

    document.set_look_into_packages(true).unwrap();
    let expanded = child_named(&document, root, "Viewer.app");
    assert_eq!(
        tree(&document).entry_kind(expanded),
        Some(EntryKind::Package { expanded: true })
    );
    assert!(document.is_node(expanded));
    assert_eq!(tree(&document).size(root), 310);
    assert_eq!(text_stats(&document), Some((2, 310)));
    assert!(document.kind_statistic_for_kind("Application").is_none());
    assert_consistent(&document);

    document.set_look_into_packages(false).unwrap();
    let collapsed = child_named(&document, root, "Viewer.app");
    assert_eq!(tree(&document).child_count(collapsed), 0);
    assert_eq!(
        document.kind_statistic_for_kind("Application").map(|s| s.size()),
        Some(300)
    );

    assert_eq!(
        drain(&events),
        [
            DocumentEvent::ViewOptionChanged {
                option: ViewOption::PackageContents,
                old: false,
                new: true,
            },
            DocumentEvent::ViewOptionChanged {
                option: ViewOption::PackageContents,
                old: true,
                new: false,
            },
        ]
    );
}

/// A package deleted since the scan is dropped rather than failing the
/// toggle.
#[test]
fn package_toggle_drops_vanished_package() {
    let tmp = TempDir::new().unwrap();
    let app = tmp.path().join("Viewer.app");
    fs::create_dir_all(app.join("Contents")).unwrap();
    write_bytes(&app.join("Contents").join("notes.txt"), 300);
    write_bytes(&tmp.path().join("readme.txt"), 10);
    let mut document = scanned_document(tmp.path(), ScanOptions::default(), FakeTrash::default());
    let package = child_named(&document, root(&document), "Viewer.app");

    fs::remove_dir_all(&app).unwrap();
    document.set_look_into_packages(true).unwrap();

    assert!(document.view_option(ViewOption::PackageContents));
    assert!(!tree(&document).contains(package));
    assert_eq!(tree_size_of_root(&document), 10);
    assert!(document.kind_statistic_for_kind("Application").is_none());
    assert_consistent(&document);
}

/// Switching to physical sizes re-measures every file and keeps every
/// folder and statistic total consistent.
#[test]
fn physical_size_toggle_stays_consistent() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());
    let mut document = scanned_document(tmp.path(), ScanOptions::default(), FakeTrash::default());

    document.set_use_physical_size(true).unwrap();
    assert!(document.view_option(ViewOption::PhysicalFileSize));
    assert_consistent(&document);

    document.set_use_physical_size(false).unwrap();
    assert_eq!(tree(&document).size(root(&document)), 350);
    assert_consistent(&document);
}

/// A file deleted behind the document's back is dropped while switching
/// size modes, and the switch still completes with one event.
#[test]
fn physical_size_toggle_drops_vanished_files() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());
    let mut document = scanned_document(tmp.path(), ScanOptions::default(), FakeTrash::default());
    let events = document.subscribe();
    let root = root(&document);
    let b = child_named(&document, root, "b.txt");
    document.set_selected(Some(b)).unwrap();
    drain(&events);

    fs::remove_file(tmp.path().join("b.txt")).unwrap();
    document.set_use_physical_size(true).unwrap();

    assert!(document.view_option(ViewOption::PhysicalFileSize));
    assert!(!tree(&document).contains(b));
    assert_eq!(document.selected(), None);
    assert_eq!(text_stats(&document).map(|(count, _)| count), Some(2));
    assert_consistent(&document);
    assert_eq!(
        drain(&events),
        [DocumentEvent::ViewOptionChanged {
            option: ViewOption::PhysicalFileSize,
            old: false,
            new: true,
        }]
    );

    document.set_use_physical_size(false).unwrap();
    assert_eq!(tree_size_of_root(&document), 150);
    assert_eq!(text_stats(&document), Some((2, 150)));
    assert_consistent(&document);
}

/// When a file cannot be measured, the size mode, the sizes and the
/// statistics all stay as they were and nothing is published.
#[cfg(unix)]
#[test]
fn failed_physical_size_toggle_changes_nothing() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());
    let mut document = scanned_document(tmp.path(), ScanOptions::default(), FakeTrash::default());
    let events = document.subscribe();
    let root = root(&document);
    let a = child_named(&document, root, "a.txt");

    let Some(locked) = LockedFolder::new(&tmp.path().join("sub")) else {
        return;
    };
    let err = document.set_use_physical_size(true).unwrap_err();
    drop(locked);

    assert_eq!(err.kind(), ErrorKind::LoadingFailed);
    assert!(!document.view_option(ViewOption::PhysicalFileSize));
    assert_eq!(tree(&document).size(a), 100);
    assert_eq!(tree_size_of_root(&document), 350);
    assert_eq!(text_stats(&document), Some((3, 350)));
    assert_consistent(&document);
    assert!(drain(&events).is_empty());
}

/// Space nodes hang off the root, are counted in its size, and carry no
/// kind.
#[cfg(unix)]
#[test]
fn space_nodes_extend_the_root() {
    let tmp = TempDir::new().unwrap();
    build_test_tree(tmp.path());
    let mut document = scanned_document(tmp.path(), ScanOptions::default(), FakeTrash::default());
    let root = root(&document);

    document.set_show_other_space(true).unwrap();
    document.set_show_free_space(true).unwrap();

    let tree = tree(&document);
    let special: Vec<NodeIndex> = tree
        .children(root)
        .iter()
        .copied()
        .filter(|&c| tree.is_special(c))
        .collect();
    assert_eq!(special.len(), 2);
    let extra: u64 = special.iter().map(|&c| tree.size(c)).sum();
    assert_eq!(tree.size(root), 350 + extra);
    assert!(tree.size_invariant_holds());
    assert_eq!(document.kind_index().total_size(), 350);

    document.set_show_free_space(false).unwrap();
    document.set_show_other_space(false).unwrap();
    assert_eq!(tree_size_of_root(&document), 350);
}

fn tree_size_of_root(document: &Document) -> u64 {
    tree(document).size(root(document))
}
