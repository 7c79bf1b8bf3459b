// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pinned model selection resolved from routing metadata.

use std::collections::HashMap;
use std::sync::Arc;

/// A resolved model selection for one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSelection {
    pub provider: String,
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub headers: HashMap<String, String>,
    pub pinned: bool,
}

/// Callback resolving a pinned selection from (channel, chat_id, user_id).
///
/// Returns `None` when no selection is pinned for the routing keys.
pub type SelectionResolver = Arc<
    dyn Fn(Option<&str>, Option<&str>, Option<&str>) -> Option<ResolvedSelection> + Send + Sync,
>;
