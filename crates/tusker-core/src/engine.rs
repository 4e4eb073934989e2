//! The send engine: drains an account's queues against its instance.
//!
//! Queues go out in a fixed order — boosts, then favourites, then posts —
//! each in insertion order, one blocking network call at a time. Every
//! call site gets the same bounded retry budget. Posts additionally thread
//! replies: a draft whose `reply_to` names an earlier draft's `reply_id`
//! token has the token swapped for the server id that draft earned during
//! this send, and a draft whose predecessor failed is skipped outright with
//! its fallback id written back to disk so the next run can still thread.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::Deserialize;

use crate::accounts::AccountRegistry;
use crate::filebacked::FileBacked;
use crate::net::{self, Attachment, NetResponse, Network, StatusParams};
use crate::options::UserOption;
use crate::outgoing::PostContent;
use crate::queues::{self, QueueKind};

/// Attempt budget used when the configured value is not positive.
pub const DEFAULT_RETRIES: i32 = 3;

/// Where engine progress goes; the CLI writes to stderr, tests collect.
pub trait Reporter {
    fn info(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// How a `reply_id` token resolved during this send.
enum ThreadOutcome {
    /// The draft went out; replies chain to this server id.
    Sent(String),
    /// The draft failed or was skipped; replies fall back to the last id
    /// that actually reached the server along this chain.
    Failed(String),
}

/// What became of one queued post.
enum Disposition {
    /// Sent; drop the queue entry and retire the draft file.
    Posted,
    /// Failed or skipped; keep the entry and move on to the next post.
    Kept,
    /// Something is wrong enough that the rest of the account waits for a
    /// future run.
    Halted,
}

pub struct SendEngine<'a, N: Network> {
    net: &'a mut N,
    /// Attempt budget per network call; any value below 1 falls back to 3.
    pub retries: i32,
}

impl<'a, N: Network> SendEngine<'a, N> {
    pub fn new(net: &'a mut N) -> Self {
        Self {
            net,
            retries: DEFAULT_RETRIES,
        }
    }

    /// Drain one account's queues: boosts, then favourites, then posts.
    ///
    /// Returns whether every queue emptied. Network failures stop the
    /// account and are reported, not returned as `Err`; only filesystem
    /// trouble is.
    pub fn send(
        &mut self,
        account: &str,
        account_dir: &Path,
        instance_url: &str,
        access_token: &str,
        reporter: &mut dyn Reporter,
    ) -> Result<bool> {
        let budget = attempt_budget(self.retries);
        for kind in [QueueKind::Boost, QueueKind::Fav] {
            let drained = self.drain_interactions(
                kind,
                account,
                account_dir,
                instance_url,
                access_token,
                budget,
                reporter,
            )?;
            if !drained {
                return Ok(false);
            }
        }
        self.drain_posts(
            account,
            account_dir,
            instance_url,
            access_token,
            budget,
            reporter,
        )
    }

    /// Send every registered account, keeping going past per-account
    /// failures.
    pub fn send_all(
        &mut self,
        registry: &AccountRegistry,
        reporter: &mut dyn Reporter,
    ) -> Result<bool> {
        let mut all_done = true;
        let names: Vec<String> = registry.names().map(str::to_string).collect();
        for name in names {
            let Some(settings) = registry.get(&name) else {
                continue;
            };
            let instance_url = settings.get(UserOption::InstanceUrl).map(str::to_string);
            let access_token = settings.get(UserOption::AccessToken).map(str::to_string);
            let (Some(instance_url), Some(access_token)) = (instance_url, access_token) else {
                reporter.error(&format!(
                    "{name}: instance_url and access_token must be set before sending"
                ));
                all_done = false;
                continue;
            };
            let account_dir = registry.account_dir(&name);
            match self.send(&name, &account_dir, &instance_url, &access_token, reporter) {
                Ok(true) => {}
                Ok(false) => all_done = false,
                Err(err) => {
                    reporter.error(&format!("{name}: {err:#}"));
                    all_done = false;
                }
            }
        }
        Ok(all_done)
    }

    /// Drain a fav or boost queue head-first.
    ///
    /// The first entry that fails for good (or runs out of attempts) stops
    /// this account entirely; it and everything behind it stay queued.
    fn drain_interactions(
        &mut self,
        kind: QueueKind,
        account: &str,
        account_dir: &Path,
        instance_url: &str,
        access_token: &str,
        budget: u32,
        reporter: &mut dyn Reporter,
    ) -> Result<bool> {
        let (add_action, remove_action) = match kind {
            QueueKind::Boost => ("reblog", "unreblog"),
            QueueKind::Fav => ("favourite", "unfavourite"),
            QueueKind::Post => return Ok(true),
        };

        let mut queue = queues::open(kind, account_dir)?;
        if queue.entries.is_empty() {
            return Ok(true);
        }
        reporter.info(&format!(
            "{account}: sending {} queued {add_action} change(s)",
            queue.entries.len()
        ));

        let mut sent = 0;
        let mut drained = true;
        for entry in &queue.entries {
            let (id, action) = match entry.strip_suffix('-') {
                Some(id) => (id, remove_action),
                None => (entry.as_str(), add_action),
            };
            let url = net::status_action_url(instance_url, id, action);
            let transport = &mut *self.net;
            let response =
                request_with_retries(budget, || transport.post(&url, access_token));
            if response.ok {
                sent += 1;
            } else {
                report_failure(reporter, account, &format!("{action} {id}"), &response);
                drained = false;
                break;
            }
        }

        queue.entries.drain(..sent);
        queue.save()?;
        Ok(drained)
    }

    /// Drain the post queue in order, threading replies as drafts go out.
    fn drain_posts(
        &mut self,
        account: &str,
        account_dir: &Path,
        instance_url: &str,
        access_token: &str,
        budget: u32,
        reporter: &mut dyn Reporter,
    ) -> Result<bool> {
        let mut queue = queues::open(QueueKind::Post, account_dir)?;
        if queue.entries.is_empty() {
            return Ok(true);
        }
        reporter.info(&format!(
            "{account}: sending {} queued post(s)",
            queue.entries.len()
        ));

        let posts_dir = queues::posts_dir(account_dir);
        let mut threads: BTreeMap<String, ThreadOutcome> = BTreeMap::new();
        let mut kept: Vec<String> = Vec::new();
        let mut drained = true;
        let mut halted = false;

        let entries = std::mem::take(&mut queue.entries);
        for entry in &entries {
            if halted {
                kept.push(entry.clone());
                continue;
            }
            let path = posts_dir.join(entry);
            let mut post = match FileBacked::<PostContent>::load(&path) {
                Ok(post) => post,
                Err(err) => {
                    reporter.error(&format!(
                        "{account}: cannot read queued post {entry}: {err:#}"
                    ));
                    kept.push(entry.clone());
                    drained = false;
                    halted = true;
                    continue;
                }
            };

            let disposition = self.dispatch_post(
                account,
                entry,
                &mut post,
                &mut threads,
                instance_url,
                access_token,
                budget,
                reporter,
            );
            match disposition {
                Disposition::Posted => {
                    if let Err(err) = post.delete() {
                        reporter.warn(&format!(
                            "{account}: could not retire sent post {entry}: {err:#}"
                        ));
                    }
                }
                Disposition::Kept => {
                    kept.push(entry.clone());
                    drained = false;
                }
                Disposition::Halted => {
                    kept.push(entry.clone());
                    drained = false;
                    halted = true;
                }
            }
        }

        queue.entries = kept;
        queue.save()?;
        Ok(drained)
    }

    /// Upload a draft's attachments and create its status.
    ///
    /// The draft is mutated in place when its `reply_to` token resolves;
    /// the caller's scope-exit rewrite is what persists that back to disk
    /// for drafts that do not go out.
    #[allow(clippy::too_many_arguments)]
    fn dispatch_post(
        &mut self,
        account: &str,
        entry: &str,
        post: &mut PostContent,
        threads: &mut BTreeMap<String, ThreadOutcome>,
        instance_url: &str,
        access_token: &str,
        budget: u32,
        reporter: &mut dyn Reporter,
    ) -> Disposition {
        if !post.reply_to_id.is_empty() {
            match threads.get(&post.reply_to_id) {
                Some(ThreadOutcome::Sent(id)) => post.reply_to_id = id.clone(),
                Some(ThreadOutcome::Failed(fallback)) => {
                    reporter.warn(&format!(
                        "{account}: skipping {entry}; the post it replies to did not go out"
                    ));
                    post.reply_to_id = fallback.clone();
                    if !post.reply_id.is_empty() {
                        threads.insert(
                            post.reply_id.clone(),
                            ThreadOutcome::Failed(post.reply_to_id.clone()),
                        );
                    }
                    return Disposition::Kept;
                }
                None => {}
            }
        }

        let media_url = net::media_url(instance_url);
        let mut attachment_ids = Vec::with_capacity(post.attachments.len());
        for (index, raw_path) in post.attachments.iter().enumerate() {
            let file = match fs::canonicalize(raw_path) {
                Ok(file) => file,
                Err(err) => {
                    reporter.error(&format!(
                        "{account}: attachment {raw_path} for {entry} is unreadable: {err}"
                    ));
                    return Disposition::Halted;
                }
            };
            let attachment = Attachment {
                file,
                description: post.description_for(index).to_string(),
            };
            let transport = &mut *self.net;
            let response = request_with_retries(budget, || {
                transport.upload(&media_url, access_token, attachment.clone())
            });
            if !response.ok {
                report_failure(reporter, account, &format!("uploading {raw_path}"), &response);
                return Disposition::Halted;
            }
            match parse_returned_id(&response.message) {
                Some(id) => attachment_ids.push(id),
                None => {
                    reporter.error(&format!(
                        "{account}: upload response for {raw_path} carried no id: {}",
                        response.message
                    ));
                    return Disposition::Halted;
                }
            }
        }

        let params = StatusParams {
            body: post.text.clone(),
            content_warning: post.content_warning.clone(),
            visibility: post.visibility.as_param().unwrap_or("").to_string(),
            in_reply_to_id: post.reply_to_id.clone(),
            attachment_ids,
        };
        let status_url = net::new_status_url(instance_url);
        let transport = &mut *self.net;
        let response = request_with_retries(budget, || {
            transport.new_status(&status_url, access_token, params.clone())
        });
        if response.ok {
            if !post.reply_id.is_empty() {
                let id = parse_returned_id(&response.message).unwrap_or_default();
                threads.insert(post.reply_id.clone(), ThreadOutcome::Sent(id));
            }
            reporter.info(&format!("{account}: sent {entry}"));
            Disposition::Posted
        } else {
            report_failure(reporter, account, &format!("posting {entry}"), &response);
            if !post.reply_id.is_empty() {
                threads.insert(
                    post.reply_id.clone(),
                    ThreadOutcome::Failed(post.reply_to_id.clone()),
                );
            }
            Disposition::Kept
        }
    }
}

/// Call `operation` until it succeeds, stops being retryable, or the
/// attempt budget runs out. Uniform retry: no backoff, no sleeping.
fn request_with_retries(
    budget: u32,
    mut operation: impl FnMut() -> NetResponse,
) -> NetResponse {
    let mut attempt = 0;
    loop {
        let response = operation();
        attempt += 1;
        if response.ok || !response.retryable || attempt >= budget {
            return response;
        }
    }
}

/// Any configured budget below one falls back to [`DEFAULT_RETRIES`].
fn attempt_budget(retries: i32) -> u32 {
    if retries < 1 {
        DEFAULT_RETRIES as u32
    } else {
        retries as u32
    }
}

fn report_failure(
    reporter: &mut dyn Reporter,
    account: &str,
    what: &str,
    response: &NetResponse,
) {
    let verdict = if response.retryable {
        "kept failing"
    } else {
        "failed"
    };
    reporter.error(&format!(
        "{account}: {what} {verdict} (status {}): {}",
        response.status_code, response.message
    ));
}

/// The interesting part of a status or media response body.
#[derive(Deserialize)]
struct ReturnedId {
    id: String,
}

/// Pull the `id` field out of an API response body.
fn parse_returned_id(message: &str) -> Option<String> {
    serde_json::from_str::<ReturnedId>(message)
        .ok()
        .map(|payload| payload.id)
}
