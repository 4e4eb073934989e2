//! Typed per-account settings persisted as `key=value` lines in `user.cfg`.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};

use crate::filebacked::{FileBacked, LineBacked};

/// File holding an account's settings, directly under the account directory.
pub const USER_CONFIG: &str = "user.cfg";

/// Every setting an account can carry.
///
/// The first six hold free-form strings; the `Pull*` options hold a
/// [`SyncSetting`] and control which collections a pull would fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UserOption {
    AccountName,
    InstanceUrl,
    ClientId,
    ClientSecret,
    AccessToken,
    AuthCode,
    PullHome,
    PullNotifications,
    PullDms,
    PullBookmarks,
    PullLists,
}

impl UserOption {
    pub const ALL: [UserOption; 11] = [
        UserOption::AccountName,
        UserOption::InstanceUrl,
        UserOption::ClientId,
        UserOption::ClientSecret,
        UserOption::AccessToken,
        UserOption::AuthCode,
        UserOption::PullHome,
        UserOption::PullNotifications,
        UserOption::PullDms,
        UserOption::PullBookmarks,
        UserOption::PullLists,
    ];

    /// The key this option is stored under.
    pub fn key(self) -> &'static str {
        match self {
            UserOption::AccountName => "account_name",
            UserOption::InstanceUrl => "instance_url",
            UserOption::ClientId => "client_id",
            UserOption::ClientSecret => "client_secret",
            UserOption::AccessToken => "access_token",
            UserOption::AuthCode => "auth_code",
            UserOption::PullHome => "pull_home",
            UserOption::PullNotifications => "pull_notifications",
            UserOption::PullDms => "pull_dms",
            UserOption::PullBookmarks => "pull_bookmarks",
            UserOption::PullLists => "pull_lists",
        }
    }

    pub fn from_key(key: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|option| option.key() == key)
            .ok_or_else(|| anyhow!("unknown option: {key}"))
    }

    /// Whether this option takes a [`SyncSetting`] rather than a string.
    pub fn is_sync(self) -> bool {
        matches!(
            self,
            UserOption::PullHome
                | UserOption::PullNotifications
                | UserOption::PullDms
                | UserOption::PullBookmarks
                | UserOption::PullLists
        )
    }

    /// Home and notifications sync by default; the rest stay untouched
    /// until asked for.
    pub fn default_sync(self) -> SyncSetting {
        match self {
            UserOption::PullHome | UserOption::PullNotifications => SyncSetting::NewestFirst,
            _ => SyncSetting::DontSync,
        }
    }
}

/// How (and whether) a pullable collection is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncSetting {
    #[default]
    DontSync,
    NewestFirst,
    OldestFirst,
}

impl SyncSetting {
    pub fn name(self) -> &'static str {
        match self {
            SyncSetting::DontSync => "dont_sync",
            SyncSetting::NewestFirst => "newest_first",
            SyncSetting::OldestFirst => "oldest_first",
        }
    }

    /// The stored form: the first character of the name.
    pub fn initial(self) -> char {
        match self {
            SyncSetting::DontSync => 'd',
            SyncSetting::NewestFirst => 'n',
            SyncSetting::OldestFirst => 'o',
        }
    }

    pub fn from_initial(first: char) -> Result<Self> {
        match first {
            'd' => Ok(SyncSetting::DontSync),
            'n' => Ok(SyncSetting::NewestFirst),
            'o' => Ok(SyncSetting::OldestFirst),
            other => bail!("unknown setting: no sync setting starts with {other:?}"),
        }
    }

    /// Parse either a full name or its stored one-character form.
    pub fn parse(value: &str) -> Result<Self> {
        let first = value
            .chars()
            .next()
            .ok_or_else(|| anyhow!("unknown setting: empty value"))?;
        Self::from_initial(first)
    }
}

/// Raw `key=value` map behind `user.cfg`.
///
/// Keys nobody recognises carry through a rewrite untouched, so older and
/// newer builds can share a file.
#[derive(Debug, Default)]
pub struct OptionMap {
    values: BTreeMap<String, String>,
}

impl OptionMap {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl LineBacked for OptionMap {
    fn read_line(&mut self, line: &str) -> Result<()> {
        let (key, value) = line
            .split_once('=')
            .with_context(|| format!("expected key=value, got {line:?}"))?;
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn write_all(&self, out: &mut dyn Write) -> io::Result<()> {
        for (key, value) in &self.values {
            writeln!(out, "{key}={value}")?;
        }
        Ok(())
    }
}

/// Typed view over one account's `user.cfg`.
#[derive(Debug)]
pub struct UserSettings {
    file: FileBacked<OptionMap>,
}

impl UserSettings {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            file: FileBacked::load(path.to_path_buf())?,
        })
    }

    /// The stored value, if any. Sync options come back in their stored
    /// one-character form; use [`UserSettings::sync_setting`] for the
    /// parsed value.
    pub fn get(&self, option: UserOption) -> Option<&str> {
        self.file.get(option.key())
    }

    /// Replace or append the option. Sync option values are validated
    /// through the one-character dispatch before being stored.
    pub fn set(&mut self, option: UserOption, value: &str) -> Result<()> {
        let stored = if option.is_sync() {
            SyncSetting::parse(value)?.initial().to_string()
        } else {
            value.to_string()
        };
        self.file.set(option.key(), stored);
        Ok(())
    }

    /// Remove the option's line entirely.
    pub fn unset(&mut self, option: UserOption) {
        self.file.remove(option.key());
    }

    pub fn sync_setting(&self, option: UserOption) -> Result<SyncSetting> {
        match self.get(option) {
            Some(stored) => SyncSetting::parse(stored),
            None => Ok(option.default_sync()),
        }
    }

    pub fn save(&mut self) -> Result<()> {
        self.file.save()
    }
}
