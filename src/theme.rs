//! Theme preference
//!
//! `light` or `dark`, persisted under the `theme` key. Until the user picks
//! one, the system preference applies.

use crate::storage::{keys, Durability, StorageSync, Subscription};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("Unknown theme: {}", other)),
        }
    }
}

/// Persisted theme preference with system fallback
pub struct ThemeStore {
    storage: Arc<StorageSync>,
    system: RwLock<Theme>,
}

impl ThemeStore {
    pub fn new(storage: Arc<StorageSync>, system_preference: Theme) -> Self {
        Self {
            storage,
            system: RwLock::new(system_preference),
        }
    }

    /// Theme chosen by the user, if any
    pub fn stored(&self) -> Option<Theme> {
        self.storage.read(keys::THEME, None)
    }

    /// Effective theme
    pub fn current(&self) -> Theme {
        self.stored().unwrap_or_else(|| self.system_preference())
    }

    pub fn system_preference(&self) -> Theme {
        *self.system.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a new system preference. Only visible through `current` while
    /// the user has not chosen a theme.
    pub fn set_system_preference(&self, theme: Theme) {
        *self.system.write().unwrap_or_else(|e| e.into_inner()) = theme;
    }

    pub fn set(&self, theme: Theme) -> Durability {
        tracing::debug!(theme = %theme, "Theme set");
        self.storage.write(keys::THEME, &theme)
    }

    /// Switch between light and dark, returning the new theme
    pub fn toggle(&self) -> Theme {
        let next = self.current().toggled();
        self.set(next);
        next
    }

    /// Forget the user's choice and follow the system preference again
    pub fn reset(&self) {
        self.storage.remove(keys::THEME);
    }

    /// Run `callback` whenever the stored theme changes in any process
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<Theme>) + Send + Sync + 'static,
    {
        self.storage.subscribe(keys::THEME, callback)
    }
}
