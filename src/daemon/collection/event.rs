use std::path::Path;

use notify::{
    event::{AccessKind, AccessMode, ModifyKind, RenameMode},
    Event, EventKind,
};

use crate::fs::content::vault_relative;

/// Notification delivered to the tracker. Paths are vault relative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    /// Contents of the file were written.
    FileSaved(String),
    /// The file appeared or was opened. Only used to seed the word count cache.
    FileOpened(String),
}

impl TrackerEvent {
    pub fn path(&self) -> &str {
        match self {
            TrackerEvent::FileSaved(path) | TrackerEvent::FileOpened(path) => path,
        }
    }

    /// Translates a raw file system event. Newly created files are treated as opened so a note
    /// created from a template doesn't count the template as written words.
    pub fn from_notify(
        vault: &Path,
        event: &Event,
        is_file: impl Fn(&Path) -> bool,
    ) -> Vec<TrackerEvent> {
        let (saved, paths) = match event.kind {
            EventKind::Create(_) | EventKind::Access(AccessKind::Open(_)) => {
                (false, event.paths.as_slice())
            }
            EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
                (true, event.paths.as_slice())
            }
            // Editors that save atomically rename a temporary file over the note.
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => (true, event.paths.as_slice()),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => (
                true,
                event
                    .paths
                    .last()
                    .map(std::slice::from_ref)
                    .unwrap_or_default(),
            ),
            _ => return vec![],
        };

        paths
            .iter()
            .filter(|path| is_file(path.as_path()))
            .filter_map(|path| vault_relative(vault, path))
            .map(|path| {
                if saved {
                    TrackerEvent::FileSaved(path)
                } else {
                    TrackerEvent::FileOpened(path)
                }
            })
            .collect()
    }
}
