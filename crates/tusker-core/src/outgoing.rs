//! The on-disk format for draft statuses awaiting dispatch.
//!
//! A draft is a line-oriented document: recognised `key=value` headers
//! first, then a blank separator, then the body verbatim. Header lines
//! nobody recognises are preserved across a rewrite so hand-edited drafts
//! keep whatever else their author put there.

use std::io::{self, Write};

use anyhow::{Result, bail};

use crate::filebacked::{FileBacked, LineBacked};

/// Who can see a status. `Default` leaves the choice to the server by
/// omitting the parameter entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Default,
    Public,
    Unlisted,
    Private,
    Direct,
}

impl Visibility {
    pub fn name(self) -> &'static str {
        match self {
            Visibility::Default => "default",
            Visibility::Public => "public",
            Visibility::Unlisted => "unlisted",
            Visibility::Private => "private",
            Visibility::Direct => "direct",
        }
    }

    /// The API parameter value; `None` omits the field.
    pub fn as_param(self) -> Option<&'static str> {
        match self {
            Visibility::Default => None,
            other => Some(other.name()),
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "default" => Ok(Visibility::Default),
            "public" => Ok(Visibility::Public),
            "unlisted" => Ok(Visibility::Unlisted),
            "private" => Ok(Visibility::Private),
            "direct" => Ok(Visibility::Direct),
            other => bail!("unknown visibility: {other}"),
        }
    }
}

/// One draft status.
///
/// `reply_to_id` may hold either a real server id or another queued
/// draft's `reply_id` token; the send engine resolves tokens to server
/// ids as the thread goes out. `descriptions` pairs positionally with
/// `attachments` and may be shorter.
#[derive(Debug, Default)]
pub struct PostContent {
    pub text: String,
    pub content_warning: String,
    pub visibility: Visibility,
    pub reply_to_id: String,
    pub reply_id: String,
    pub attachments: Vec<String>,
    pub descriptions: Vec<String>,
    unknown_headers: Vec<String>,
    in_body: bool,
}

impl PostContent {
    /// Description for the attachment at `index`, empty when absent.
    pub fn description_for(&self, index: usize) -> &str {
        self.descriptions
            .get(index)
            .map(String::as_str)
            .unwrap_or("")
    }
}

impl LineBacked for PostContent {
    // Blank lines separate headers from body and may appear inside it;
    // `#` has no meaning in a status.
    const SKIP_BLANK: bool = false;
    const SKIP_COMMENT: bool = false;

    fn read_line(&mut self, line: &str) -> Result<()> {
        if self.in_body {
            if !self.text.is_empty() {
                self.text.push('\n');
            }
            self.text.push_str(line);
            return Ok(());
        }
        if line.trim().is_empty() {
            self.in_body = true;
        } else if let Some(value) = line.strip_prefix("reply_to=") {
            self.reply_to_id = value.to_string();
        } else if let Some(value) = line.strip_prefix("reply_id=") {
            self.reply_id = value.to_string();
        } else if let Some(value) = line.strip_prefix("cw=") {
            self.content_warning = value.to_string();
        } else if let Some(value) = line.strip_prefix("vis=") {
            self.visibility = Visibility::parse(value)?;
        } else if let Some(value) = line.strip_prefix("attach=") {
            self.attachments.push(value.to_string());
        } else if let Some(value) = line.strip_prefix("descr=") {
            self.descriptions.push(value.to_string());
        } else if looks_like_header(line) {
            self.unknown_headers.push(line.to_string());
        } else {
            // No separator; the body just started.
            self.in_body = true;
            self.text.push_str(line);
        }
        Ok(())
    }

    fn write_all(&self, out: &mut dyn Write) -> io::Result<()> {
        if !self.reply_to_id.is_empty() {
            writeln!(out, "reply_to={}", self.reply_to_id)?;
        }
        if !self.reply_id.is_empty() {
            writeln!(out, "reply_id={}", self.reply_id)?;
        }
        if !self.content_warning.is_empty() {
            writeln!(out, "cw={}", self.content_warning)?;
        }
        if let Some(vis) = self.visibility.as_param() {
            writeln!(out, "vis={vis}")?;
        }
        for attachment in &self.attachments {
            writeln!(out, "attach={attachment}")?;
        }
        for description in &self.descriptions {
            writeln!(out, "descr={description}")?;
        }
        for header in &self.unknown_headers {
            writeln!(out, "{header}")?;
        }
        writeln!(out)?;
        writeln!(out, "{}", self.text)?;
        Ok(())
    }
}

/// A draft post loaded for edit or dispatch.
pub type OutgoingPost = FileBacked<PostContent>;

/// Header lines are `key=value` with a bare word key.
fn looks_like_header(line: &str) -> bool {
    match line.split_once('=') {
        Some((key, _)) => {
            !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}
