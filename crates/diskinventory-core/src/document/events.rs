/// Change notifications published by a [`Document`](super::Document).
///
/// Subscribers get their own unbounded channel. Events are sent on the
/// thread that mutated the document; a subscriber that has dropped its
/// receiver is forgotten on the next send.
use crate::model::NodeIndex;
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Display options that change how the tree is measured or shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewOption {
    /// Sizes are allocated blocks instead of logical lengths.
    PhysicalFileSize,
    /// Packages are expanded into their contents.
    PackageContents,
    /// The root carries a synthetic free-space child.
    FreeSpace,
    /// The root carries a synthetic child for space used outside the scan.
    OtherSpace,
    /// Kinds are derived from names only.
    IgnoreCreatorCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    SelectionChanged {
        old: Option<NodeIndex>,
        new: Option<NodeIndex>,
    },
    ZoomedItemChanged {
        old: Option<NodeIndex>,
        new: Option<NodeIndex>,
    },
    /// The tree or the kind statistics changed structurally. Carries no
    /// payload; observers re-read what they display. Selection or zoom
    /// changes caused by the same operation are folded into this event.
    ItemsChanged,
    ViewOptionChanged {
        option: ViewOption,
        old: bool,
        new: bool,
    },
}

/// Fan-out of [`DocumentEvent`]s to any number of subscribers.
#[derive(Debug, Default)]
pub(crate) struct Notifier {
    subscribers: Vec<Sender<DocumentEvent>>,
}

impl Notifier {
    pub(crate) fn subscribe(&mut self) -> Receiver<DocumentEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub(crate) fn emit(&mut self, event: DocumentEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
