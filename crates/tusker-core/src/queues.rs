//! Per-account queue files: ordered lists of pending intents.
//!
//! Each account carries up to three queues. `fav.queue` and `boost.queue`
//! hold status ids, optionally suffixed with `-` for removals, under an
//! inversion-on-append rule: queueing the opposite form of a pending entry
//! cancels it instead of stacking. `post.queue` holds file names under the
//! account's `posts/` directory, appended as-is because order carries the
//! threading.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::filebacked::{FileBacked, LineBacked};

/// Directory under an account holding copies of queued outgoing posts.
pub const POSTS_DIRECTORY: &str = "posts";

/// The three outbound queues an account carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Boost,
    Fav,
    Post,
}

impl QueueKind {
    pub fn file_name(self) -> &'static str {
        match self {
            QueueKind::Boost => "boost.queue",
            QueueKind::Fav => "fav.queue",
            QueueKind::Post => "post.queue",
        }
    }
}

/// Ordered queue contents, one entry per line. Insertion order is
/// significant: it is the dispatch order.
#[derive(Debug, Default)]
pub struct QueueList {
    pub entries: Vec<String>,
}

impl LineBacked for QueueList {
    fn read_line(&mut self, line: &str) -> Result<()> {
        self.entries.push(line.to_string());
        Ok(())
    }

    fn write_all(&self, out: &mut dyn Write) -> io::Result<()> {
        for entry in &self.entries {
            writeln!(out, "{entry}")?;
        }
        Ok(())
    }

    /// An emptied queue takes its backing file with it.
    fn is_vacant(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn queue_path(kind: QueueKind, account_dir: &Path) -> PathBuf {
    account_dir.join(kind.file_name())
}

pub fn posts_dir(account_dir: &Path) -> PathBuf {
    account_dir.join(POSTS_DIRECTORY)
}

/// Open a queue for mutation; it is written back at scope exit.
pub fn open(kind: QueueKind, account_dir: &Path) -> Result<FileBacked<QueueList>> {
    FileBacked::load(queue_path(kind, account_dir))
}

/// Append `items` to the queue.
///
/// For `fav`/`boost` the append cancels a pending opposite entry instead of
/// stacking. For `post` each item names a draft file, which is copied into
/// `posts/` and queued by file name.
pub fn enqueue(kind: QueueKind, account_dir: &Path, items: &[String]) -> Result<()> {
    let mut queue = open(kind, account_dir)?;
    match kind {
        QueueKind::Post => {
            let posts = posts_dir(account_dir);
            fs::create_dir_all(&posts)
                .with_context(|| format!("failed to create {}", posts.display()))?;
            for item in items {
                let name = copy_post_in(&posts, Path::new(item))?;
                queue.entries.push(name);
            }
        }
        _ => {
            for item in items {
                toggle(&mut queue.entries, item.clone());
            }
        }
    }
    queue.save()
}

/// Take `items` back out of the queue.
///
/// For `fav`/`boost` this appends the opposite form of each id through the
/// same inversion rule, so removing a not-yet-sent add simply cancels it.
/// For `post` the matching queue lines go away along with their copied
/// draft files.
pub fn dequeue(kind: QueueKind, account_dir: &Path, items: &[String]) -> Result<()> {
    let mut queue = open(kind, account_dir)?;
    match kind {
        QueueKind::Post => {
            let posts = posts_dir(account_dir);
            for item in items {
                let name = post_file_name(item);
                queue.entries.retain(|entry| entry != name);
                remove_if_present(&posts.join(name))?;
            }
        }
        _ => {
            for item in items {
                toggle(&mut queue.entries, opposite_form(item));
            }
        }
    }
    queue.save()
}

/// Empty the queue; for `post`, the copied draft files go too.
pub fn clear(kind: QueueKind, account_dir: &Path) -> Result<()> {
    let mut queue = open(kind, account_dir)?;
    if kind == QueueKind::Post {
        let posts = posts_dir(account_dir);
        for entry in &queue.entries {
            remove_if_present(&posts.join(entry))?;
        }
    }
    queue.entries.clear();
    queue.save()
}

/// The current ordered contents, without taking the write lock on drop.
pub fn list(kind: QueueKind, account_dir: &Path) -> Result<Vec<String>> {
    let queue = FileBacked::<QueueList>::load_read_only(queue_path(kind, account_dir))?;
    Ok(queue.entries.clone())
}

/// Inversion-on-append: queueing `X` removes a pending `X-` and vice
/// versa; otherwise the item is appended. Duplicates without an
/// intervening opposite are allowed and each produces one network call.
fn toggle(entries: &mut Vec<String>, item: String) {
    let opposite = opposite_form(&item);
    if let Some(found) = entries.iter().position(|entry| *entry == opposite) {
        entries.remove(found);
    } else {
        entries.push(item);
    }
}

fn opposite_form(item: &str) -> String {
    match item.strip_suffix('-') {
        Some(id) => id.to_string(),
        None => format!("{item}-"),
    }
}

fn copy_post_in(posts: &Path, source: &Path) -> Result<String> {
    let name = source
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no usable file name", source.display()))?;
    fs::copy(source, posts.join(name))
        .with_context(|| format!("failed to copy {} into the queue", source.display()))?;
    Ok(name.to_string())
}

/// Queue entries are bare file names; accept a full path too.
fn post_file_name(item: &str) -> &str {
    Path::new(item)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(item)
}

fn remove_if_present(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("failed to remove {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use tempfile::tempdir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn enqueued_ids_come_back_in_order() {
        let dir = tempdir().expect("tempdir");
        enqueue(
            QueueKind::Fav,
            dir.path(),
            &strings(&["someid", "someotherid", "mrid"]),
        )
        .expect("enqueue");

        assert_eq!(
            list(QueueKind::Fav, dir.path()).expect("list"),
            strings(&["someid", "someotherid", "mrid"])
        );
    }

    #[test]
    fn queueing_the_opposite_form_cancels_instead_of_stacking() {
        let dir = tempdir().expect("tempdir");
        enqueue(QueueKind::Boost, dir.path(), &strings(&["keep", "goner"])).expect("enqueue");
        enqueue(QueueKind::Boost, dir.path(), &strings(&["goner-"])).expect("cancel");

        assert_eq!(
            list(QueueKind::Boost, dir.path()).expect("list"),
            strings(&["keep"])
        );
    }

    #[test]
    fn dequeue_appends_the_opposite_form() {
        let dir = tempdir().expect("tempdir");

        // Cancelling a pending add leaves nothing behind.
        enqueue(QueueKind::Fav, dir.path(), &strings(&["pending"])).expect("enqueue");
        dequeue(QueueKind::Fav, dir.path(), &strings(&["pending"])).expect("dequeue");
        assert!(list(QueueKind::Fav, dir.path()).expect("list").is_empty());

        // Removing something never queued records the removal itself.
        dequeue(QueueKind::Fav, dir.path(), &strings(&["elsewhere"])).expect("dequeue");
        assert_eq!(
            list(QueueKind::Fav, dir.path()).expect("list"),
            strings(&["elsewhere-"])
        );
    }

    #[test]
    fn duplicate_adds_each_keep_their_line() {
        let dir = tempdir().expect("tempdir");
        enqueue(QueueKind::Fav, dir.path(), &strings(&["twice", "twice"])).expect("enqueue");

        assert_eq!(
            list(QueueKind::Fav, dir.path()).expect("list"),
            strings(&["twice", "twice"])
        );
    }

    #[test]
    fn an_emptied_queue_loses_its_backing_file() {
        let dir = tempdir().expect("tempdir");
        enqueue(QueueKind::Fav, dir.path(), &strings(&["only"])).expect("enqueue");
        assert!(queue_path(QueueKind::Fav, dir.path()).exists());

        enqueue(QueueKind::Fav, dir.path(), &strings(&["only-"])).expect("cancel");
        assert!(!queue_path(QueueKind::Fav, dir.path()).exists());
    }

    #[test]
    fn clearing_wipes_queue_and_post_copies() {
        let dir = tempdir().expect("tempdir");
        let draft = dir.path().join("draft.post");
        fs::write(&draft, "\nhello\n").expect("write draft");

        enqueue(
            QueueKind::Post,
            dir.path(),
            &[draft.display().to_string()],
        )
        .expect("enqueue");
        assert!(posts_dir(dir.path()).join("draft.post").exists());

        clear(QueueKind::Post, dir.path()).expect("clear");
        assert!(list(QueueKind::Post, dir.path()).expect("list").is_empty());
        assert!(!posts_dir(dir.path()).join("draft.post").exists());
        // The source draft is the user's file; it stays.
        assert!(draft.exists());
    }

    #[test]
    fn queued_posts_are_copied_in_and_appended_in_order() {
        let dir = tempdir().expect("tempdir");
        let first = dir.path().join("first.post");
        let second = dir.path().join("second.post");
        fs::write(&first, "\none\n").expect("write");
        fs::write(&second, "\ntwo\n").expect("write");

        enqueue(
            QueueKind::Post,
            dir.path(),
            &[first.display().to_string(), second.display().to_string()],
        )
        .expect("enqueue");

        assert_eq!(
            list(QueueKind::Post, dir.path()).expect("list"),
            strings(&["first.post", "second.post"])
        );
        assert!(posts_dir(dir.path()).join("first.post").exists());
        assert!(posts_dir(dir.path()).join("second.post").exists());
    }

    #[test]
    fn dequeueing_a_post_removes_line_and_copy() {
        let dir = tempdir().expect("tempdir");
        let draft = dir.path().join("draft.post");
        fs::write(&draft, "\nhello\n").expect("write");

        enqueue(QueueKind::Post, dir.path(), &[draft.display().to_string()]).expect("enqueue");
        dequeue(QueueKind::Post, dir.path(), &strings(&["draft.post"])).expect("dequeue");

        assert!(list(QueueKind::Post, dir.path()).expect("list").is_empty());
        assert!(!posts_dir(dir.path()).join("draft.post").exists());
    }

    proptest! {
        /// Whatever sequence of adds goes in, a close-and-reopen reads the
        /// same ordered list back.
        #[test]
        fn queue_round_trips(ids in proptest::collection::vec("[a-z0-9]{1,12}", 0..20)) {
            let dir = tempdir().expect("tempdir");
            let items: Vec<String> = ids.clone();
            enqueue(QueueKind::Fav, dir.path(), &items).expect("enqueue");

            let mut expected: Vec<String> = Vec::new();
            for id in ids {
                let opposite = opposite_form(&id);
                if let Some(found) = expected.iter().position(|entry| *entry == opposite) {
                    expected.remove(found);
                } else {
                    expected.push(id);
                }
            }
            prop_assert_eq!(list(QueueKind::Fav, dir.path()).expect("list"), expected);
        }

        /// Queueing `X` then `X-` (or the reverse) always annihilates.
        #[test]
        fn opposite_pairs_annihilate(id in "[a-z0-9]{1,12}", add_first in any::<bool>()) {
            let dir = tempdir().expect("tempdir");
            let add = id.clone();
            let remove = format!("{id}-");
            let (first, second) = if add_first { (add, remove) } else { (remove, add) };

            enqueue(QueueKind::Boost, dir.path(), &[first]).expect("first");
            enqueue(QueueKind::Boost, dir.path(), &[second]).expect("second");
            prop_assert!(list(QueueKind::Boost, dir.path()).expect("list").is_empty());
        }
    }
}
