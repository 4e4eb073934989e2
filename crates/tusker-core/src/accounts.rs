//! Discovery and addressing of configured accounts.
//!
//! Accounts live as sub-directories of `<config>/msync_accounts/`, one per
//! `user@instance.tld`. The registry loads every account's settings on
//! open; prefix lookup is the only addressing mechanism callers get.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::options::{USER_CONFIG, UserOption, UserSettings};
use crate::queues::POSTS_DIRECTORY;

/// Directory under the configuration root holding one sub-directory per
/// account.
pub const ACCOUNT_DIRECTORY: &str = "msync_accounts";

#[derive(Debug)]
pub struct AccountRegistry {
    root: PathBuf,
    accounts: BTreeMap<String, UserSettings>,
}

impl AccountRegistry {
    /// Load every account found under `root` (which need not exist yet).
    pub fn open(root: &Path) -> Result<Self> {
        let mut accounts = BTreeMap::new();
        if root.exists() {
            let listing = fs::read_dir(root)
                .with_context(|| format!("failed to list {}", root.display()))?;
            for entry in listing {
                let entry =
                    entry.with_context(|| format!("failed to list {}", root.display()))?;
                let file_type = entry
                    .file_type()
                    .with_context(|| format!("failed to inspect {}", root.display()))?;
                if !file_type.is_dir() {
                    continue;
                }
                let name = match entry.file_name().into_string() {
                    Ok(name) => name,
                    Err(_) => continue,
                };
                let settings = UserSettings::open(&entry.path().join(USER_CONFIG))
                    .with_context(|| format!("failed to load settings for {name}"))?;
                accounts.insert(name, settings);
            }
        }
        Ok(Self {
            root: root.to_path_buf(),
            accounts,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Registered names, in sorted (hence deterministic) order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.accounts.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&UserSettings> {
        self.accounts.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut UserSettings> {
        self.accounts.get_mut(name)
    }

    /// Resolve an account by prefix; exactly one registered name must
    /// start with it.
    pub fn select(&mut self, prefix: &str) -> Result<(String, &mut UserSettings)> {
        let mut matching = self
            .accounts
            .keys()
            .filter(|name| name.starts_with(prefix));
        let name = match (matching.next(), matching.next()) {
            (Some(only), None) => only.clone(),
            _ => bail!("could not find an unambiguous match for account {prefix:?}"),
        };
        match self.accounts.get_mut(&name) {
            Some(settings) => Ok((name, settings)),
            None => bail!("account {name} vanished while being selected"),
        }
    }

    /// Register a new account directory, seeding its name and instance.
    ///
    /// Tokens and client credentials come later via `config`; only the
    /// directory skeleton and the two derivable options are written here.
    pub fn add(&mut self, name: &str) -> Result<&mut UserSettings> {
        let (user, instance) = name
            .rsplit_once('@')
            .with_context(|| bad_account_name(name))?;
        if user.is_empty() || instance.is_empty() {
            bail!("{}", bad_account_name(name));
        }
        if self.accounts.contains_key(name) {
            bail!("account {name} already exists");
        }

        let dir = self.account_dir(name);
        fs::create_dir_all(dir.join(POSTS_DIRECTORY))
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let mut settings = UserSettings::open(&dir.join(USER_CONFIG))?;
        settings.set(UserOption::AccountName, name)?;
        settings.set(UserOption::InstanceUrl, instance)?;
        settings.save()?;

        Ok(self.accounts.entry(name.to_string()).or_insert(settings))
    }

    pub fn account_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

fn bad_account_name(name: &str) -> String {
    format!("account name {name:?} should look like username@instance.tld")
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn an_absent_root_is_an_empty_registry() {
        let dir = tempdir().expect("tempdir");
        let registry =
            AccountRegistry::open(&dir.path().join("nothing_here")).expect("open");
        assert!(registry.is_empty());
    }

    #[test]
    fn added_accounts_are_rediscovered_on_reopen() {
        let dir = tempdir().expect("tempdir");
        let root = dir.path().join(ACCOUNT_DIRECTORY);

        let mut registry = AccountRegistry::open(&root).expect("open");
        registry.add("someone@example.social").expect("add");
        drop(registry);

        let registry = AccountRegistry::open(&root).expect("reopen");
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["someone@example.social"]
        );
        let settings = registry.get("someone@example.social").expect("loaded");
        assert_eq!(settings.get(UserOption::InstanceUrl), Some("example.social"));
        assert_eq!(
            settings.get(UserOption::AccountName),
            Some("someone@example.social")
        );
        assert!(root.join("someone@example.social").join(POSTS_DIRECTORY).is_dir());
    }

    #[test]
    fn add_rejects_names_without_an_instance() {
        let dir = tempdir().expect("tempdir");
        let mut registry = AccountRegistry::open(dir.path()).expect("open");

        assert!(registry.add("noinstance").is_err());
        assert!(registry.add("@example.social").is_err());
        assert!(registry.add("someone@").is_err());
    }

    #[test]
    fn add_rejects_duplicates() {
        let dir = tempdir().expect("tempdir");
        let mut registry = AccountRegistry::open(dir.path()).expect("open");

        registry.add("someone@example.social").expect("add");
        assert!(registry.add("someone@example.social").is_err());
    }

    #[test]
    fn prefix_selection_requires_exactly_one_match() {
        let dir = tempdir().expect("tempdir");
        let mut registry = AccountRegistry::open(dir.path()).expect("open");
        registry.add("alice@example.social").expect("add");
        registry.add("alan@example.social").expect("add");
        registry.add("bob@elsewhere.town").expect("add");

        let (name, _) = registry.select("ali").expect("unambiguous");
        assert_eq!(name, "alice@example.social");

        let err = registry.select("al").expect_err("ambiguous");
        assert!(err.to_string().contains("unambiguous"));

        assert!(registry.select("zelda").is_err());
    }

    #[test]
    fn the_empty_prefix_selects_a_sole_account() {
        let dir = tempdir().expect("tempdir");
        let mut registry = AccountRegistry::open(dir.path()).expect("open");
        registry.add("only@example.social").expect("add");

        let (name, _) = registry.select("").expect("sole account");
        assert_eq!(name, "only@example.social");
    }

    #[test]
    fn stray_files_under_the_root_are_ignored() {
        let dir = tempdir().expect("tempdir");
        let root = dir.path().join(ACCOUNT_DIRECTORY);
        fs::create_dir_all(&root).expect("mkdir");
        fs::write(root.join("not-an-account.txt"), "hm").expect("write");

        let registry = AccountRegistry::open(&root).expect("open");
        assert!(registry.is_empty());
    }
}
