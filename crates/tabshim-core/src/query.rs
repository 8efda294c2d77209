//! Query filtering for hosts that have no native `query`.
//!
//! Match patterns follow the extension convention: `<all_urls>` matches any
//! URL, `*` matches any run of characters, and URL fragments are ignored.

use crate::tab::{QueryInfo, Tab, WindowId, WindowType};

/// Window focus state the filter is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowContext {
    /// The window the caller considers "current".
    pub current_window: Option<WindowId>,
    /// The most recently focused window.
    pub last_focused_window: Option<WindowId>,
}

/// Whether `tab` satisfies every field set in `info`.
pub fn matches(info: &QueryInfo, tab: &Tab, ctx: &WindowContext) -> bool {
    if info.active.is_some_and(|active| active != tab.active) {
        return false;
    }
    if info.index.is_some_and(|index| index != tab.index) {
        return false;
    }
    if info.window_id.is_some_and(|id| id != tab.window_id) {
        return false;
    }
    if let Some(wanted) = info.current_window {
        if (ctx.current_window == Some(tab.window_id)) != wanted {
            return false;
        }
    }
    if let Some(wanted) = info.last_focused_window {
        if (ctx.last_focused_window == Some(tab.window_id)) != wanted {
            return false;
        }
    }
    if info.status.is_some() && info.status != tab.status {
        return false;
    }
    if let Some(pattern) = &info.title {
        match &tab.title {
            Some(title) if glob_match(pattern, title) => {}
            _ => return false,
        }
    }
    if let Some(filter) = &info.url {
        let Some(url) = tab.url.as_deref() else {
            return false;
        };
        let url = strip_fragment(url);
        if !filter.patterns().iter().any(|p| url_matches(p, url)) {
            return false;
        }
    }
    // Every window surfaced here is a normal browser window.
    matches!(info.window_type, None | Some(WindowType::Normal))
}

/// Match a URL against one match pattern.
pub fn url_matches(pattern: &str, url: &str) -> bool {
    if pattern == "<all_urls>" {
        return url.contains("://");
    }
    glob_match(strip_fragment(pattern), url)
}

fn strip_fragment(url: &str) -> &str {
    url.split_once('#').map_or(url, |(head, _)| head)
}

/// Glob match where `*` matches any (possibly empty) run of characters.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tab::{TabStatus, UrlFilter};

    fn tab(window_id: WindowId, index: u32, active: bool, url: &str) -> Tab {
        Tab {
            active,
            fav_icon_url: None,
            id: Some(i64::from(index) + 100 * window_id),
            incognito: false,
            index,
            pinned: false,
            status: Some(TabStatus::Complete),
            title: Some(format!("Tab {index}")),
            url: Some(url.to_string()),
            window_id,
        }
    }

    const CTX: WindowContext = WindowContext {
        current_window: Some(1),
        last_focused_window: Some(2),
    };

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*", ""));
        assert!(glob_match("https://*.example.com/*", "https://www.example.com/a/b"));
        assert!(glob_match("a*c*e", "abcde"));
        assert!(!glob_match("a*c*e", "abcdf"));
        assert!(!glob_match("abc", "abcd"));
        assert!(glob_match("Tab *", "Tab 3"));
    }

    #[test]
    fn test_url_matches_ignores_fragment() {
        assert!(url_matches("https://example.com/page", "https://example.com/page"));
        assert!(url_matches("<all_urls>", "file:///tmp/x.html"));
        assert!(!url_matches("<all_urls>", "about-blank"));
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let info = QueryInfo::default();
        assert!(matches(&info, &tab(1, 0, false, "https://a/"), &CTX));
        assert!(matches(&info, &tab(3, 4, true, "https://b/"), &CTX));
    }

    #[test]
    fn test_active_in_current_window() {
        let info = QueryInfo::active_in_current_window();
        assert!(matches(&info, &tab(1, 0, true, "https://a/"), &CTX));
        assert!(!matches(&info, &tab(1, 1, false, "https://a/"), &CTX));
        assert!(!matches(&info, &tab(2, 0, true, "https://a/"), &CTX));
    }

    #[test]
    fn test_last_focused_window() {
        let info = QueryInfo {
            last_focused_window: Some(true),
            ..QueryInfo::default()
        };
        assert!(matches(&info, &tab(2, 0, true, "https://a/"), &CTX));
        assert!(!matches(&info, &tab(1, 0, true, "https://a/"), &CTX));
    }

    #[test]
    fn test_url_patterns_any_of() {
        let info = QueryInfo {
            url: Some(UrlFilter::Many(vec![
                "https://a.test/*".to_string(),
                "https://b.test/*".to_string(),
            ])),
            ..QueryInfo::default()
        };
        assert!(matches(&info, &tab(1, 0, true, "https://b.test/x#frag"), &CTX));
        assert!(!matches(&info, &tab(1, 0, true, "https://c.test/x"), &CTX));
    }

    #[test]
    fn test_status_and_title() {
        let info = QueryInfo {
            status: Some(TabStatus::Loading),
            ..QueryInfo::default()
        };
        assert!(!matches(&info, &tab(1, 0, true, "https://a/"), &CTX));

        let info = QueryInfo {
            title: Some("Tab *".to_string()),
            ..QueryInfo::default()
        };
        assert!(matches(&info, &tab(1, 5, true, "https://a/"), &CTX));
    }
}
