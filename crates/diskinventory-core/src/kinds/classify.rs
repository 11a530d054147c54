/// Kind classification: turns a name and a little metadata into the label
/// that statistics are grouped by ("Plain Text Document", "PNG Image", ...).
///
/// Zero-heap-allocation hot path for the extension lookup: extensions are
/// lowercased into a fixed-size stack buffer. Extensions longer than the
/// buffer are never in the table and fall through to the generic label.
use crate::model::{Entry, EntryKind};
use compact_str::{format_compact, CompactString};

const MAX_EXT: usize = 16;

/// Directory extensions that are presented as a single document.
const PACKAGE_EXTENSIONS: &[&str] = &[
    "app",
    "appex",
    "bundle",
    "framework",
    "kext",
    "mpkg",
    "photoslibrary",
    "pkg",
    "playground",
    "plugin",
    "prefpane",
    "qlgenerator",
    "rtfd",
    "saver",
    "xcodeproj",
    "xcworkspace",
];

/// Classify an entry.
///
/// With `ignore_creator_code` only the name decides; otherwise an
/// extensionless executable is reported as an executable rather than a
/// generic document.
pub fn kind_name_for(entry: &Entry, ignore_creator_code: bool) -> CompactString {
    match entry.kind {
        EntryKind::Folder => CompactString::const_new("Folder"),
        EntryKind::Alias { .. } => CompactString::const_new("Alias"),
        EntryKind::Package { .. } => package_kind(&entry.name),
        EntryKind::File => file_kind(&entry.name, entry.executable && !ignore_creator_code),
    }
}

/// `true` if a directory with this name is a package.
pub fn is_package_name(name: &str) -> bool {
    let mut buf = [0u8; MAX_EXT];
    match extension(name) {
        Some(ext) => lowercase(ext, &mut buf).is_some_and(|ext| PACKAGE_EXTENSIONS.contains(&ext)),
        None => false,
    }
}

/// The part after the last dot, ignoring a leading dot (`.bashrc` has none).
fn extension(name: &str) -> Option<&str> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

/// ASCII-lowercase `ext` into `buf`; `None` if it does not fit.
fn lowercase<'a>(ext: &str, buf: &'a mut [u8; MAX_EXT]) -> Option<&'a str> {
    let bytes = ext.as_bytes();
    if bytes.len() > MAX_EXT {
        return None;
    }
    for (dest, &src) in buf.iter_mut().zip(bytes) {
        *dest = src.to_ascii_lowercase();
    }
    std::str::from_utf8(&buf[..bytes.len()]).ok()
}

fn package_kind(name: &str) -> CompactString {
    let mut buf = [0u8; MAX_EXT];
    let lower = match extension(name) {
        Some(ext) => lowercase(ext, &mut buf),
        None => None,
    };
    let label = match lower {
        Some("app") => "Application",
        Some("framework") => "Framework",
        Some("bundle") => "Bundle",
        Some("plugin") => "Plug-in",
        Some("kext") => "Kernel Extension",
        Some("pkg" | "mpkg") => "Installer Package",
        Some(ext) => return format_compact!("{} Package", ext.to_ascii_uppercase()),
        None => "Package",
    };
    CompactString::const_new(label)
}

fn file_kind(name: &str, executable: bool) -> CompactString {
    let Some(ext) = extension(name) else {
        return CompactString::const_new(if executable {
            "Unix Executable File"
        } else {
            "Document"
        });
    };

    let mut buf = [0u8; MAX_EXT];
    let Some(lower) = lowercase(ext, &mut buf) else {
        return format_compact!("{} File", ext.to_uppercase());
    };

    let label = match lower {
        // Documents
        "txt" | "text" => "Plain Text Document",
        "md" | "markdown" => "Markdown Document",
        "pdf" => "PDF Document",
        "rtf" => "Rich Text Document",
        "doc" | "docx" => "Word Document",
        "xls" | "xlsx" => "Spreadsheet",
        "ppt" | "pptx" | "key" => "Presentation",
        "csv" => "CSV Document",
        "epub" => "E-book",
        "log" => "Log File",
        // Images
        "jpg" | "jpeg" => "JPEG Image",
        "png" => "PNG Image",
        "gif" => "GIF Image",
        "tif" | "tiff" => "TIFF Image",
        "heic" | "heif" => "HEIF Image",
        "webp" => "WebP Image",
        "svg" => "SVG Image",
        "psd" => "Photoshop Document",
        "raw" | "cr2" | "nef" | "dng" => "Camera Raw Image",
        // Video
        "mp4" | "m4v" => "MPEG-4 Movie",
        "mov" => "QuickTime Movie",
        "mkv" => "Matroska Video",
        "avi" => "AVI Movie",
        "webm" => "WebM Video",
        // Audio
        "mp3" => "MP3 Audio",
        "m4a" | "aac" => "AAC Audio",
        "wav" => "Waveform Audio",
        "flac" => "FLAC Audio",
        "ogg" | "opus" => "Ogg Audio",
        // Archives and disk images
        "zip" => "ZIP Archive",
        "tar" => "Tape Archive",
        "gz" | "tgz" => "Gzip Archive",
        "bz2" | "xz" | "zst" => "Compressed Archive",
        "7z" | "rar" => "Archive",
        "dmg" | "iso" | "img" => "Disk Image",
        // Code
        "rs" => "Rust Source File",
        "c" | "h" => "C Source File",
        "cpp" | "cc" | "hpp" => "C++ Source File",
        "m" => "Objective-C Source File",
        "swift" => "Swift Source File",
        "py" => "Python Script",
        "js" | "mjs" => "JavaScript Script",
        "ts" => "TypeScript Source File",
        "sh" | "zsh" | "bash" => "Shell Script",
        "json" => "JSON Document",
        "xml" | "plist" => "XML Document",
        "yaml" | "yml" | "toml" => "Configuration File",
        "html" | "htm" => "HTML Document",
        "css" => "CSS Style Sheet",
        // Binaries
        "so" | "dylib" | "dll" => "Dynamic Library",
        "a" | "lib" => "Static Library",
        "o" => "Object File",
        "exe" => "Windows Executable",
        _ => return format_compact!("{} File", lower.to_ascii_uppercase()),
    };
    CompactString::const_new(label)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, kind: EntryKind, executable: bool) -> Entry {
        Entry {
            name: CompactString::new(name),
            kind,
            kind_name: None,
            executable,
            unreadable: false,
        }
    }

    fn file(name: &str) -> CompactString {
        kind_name_for(&entry(name, EntryKind::File, false), false)
    }

    #[test]
    fn known_extensions_get_descriptive_labels() {
        assert_eq!(file("a.txt"), "Plain Text Document");
        assert_eq!(file("photo.JPG"), "JPEG Image");
        assert_eq!(file("main.rs"), "Rust Source File");
        assert_eq!(file("backup.tar.gz"), "Gzip Archive");
    }

    #[test]
    fn unknown_extensions_use_the_extension() {
        assert_eq!(file("data.xyz"), "XYZ File");
        assert_eq!(file("weird.averyveryverylongextension"), "AVERYVERYVERYLONGEXTENSION File");
    }

    #[test]
    fn dotfiles_have_no_extension() {
        assert_eq!(file(".bashrc"), "Document");
        assert_eq!(file("trailing."), "Document");
    }

    #[test]
    fn executable_bit_stands_in_for_creator_code() {
        let tool = entry("runme", EntryKind::File, true);
        assert_eq!(kind_name_for(&tool, false), "Unix Executable File");
        assert_eq!(kind_name_for(&tool, true), "Document");
        // An extension always wins.
        let script = entry("x.sh", EntryKind::File, true);
        assert_eq!(kind_name_for(&script, false), "Shell Script");
    }

    #[test]
    fn containers_and_aliases() {
        assert_eq!(kind_name_for(&entry("src", EntryKind::Folder, false), false), "Folder");
        let link = entry("l", EntryKind::Alias { target_is_dir: true }, false);
        assert_eq!(kind_name_for(&link, false), "Alias");
        let app = entry("Tool.app", EntryKind::Package { expanded: false }, false);
        assert_eq!(kind_name_for(&app, false), "Application");
        let proj = entry("X.xcodeproj", EntryKind::Package { expanded: true }, false);
        assert_eq!(kind_name_for(&proj, false), "XCODEPROJ Package");
    }

    #[test]
    fn package_names_are_case_insensitive() {
        assert!(is_package_name("Safari.app"));
        assert!(is_package_name("Thing.FRAMEWORK"));
        assert!(!is_package_name("notes.txt"));
        assert!(!is_package_name("app"));
        assert!(!is_package_name(".app"));
    }
}
