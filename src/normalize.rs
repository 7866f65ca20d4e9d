// src/normalize.rs

//! Command normalization for hook identity
//!
//! The same hook can be written many ways depending on the install scope and
//! the operating system it was written on:
//!
//! ```text
//! node "$HOME"/.claude/hooks/init.js
//! node "$CLAUDE_PROJECT_DIR"/.claude/hooks/init.js
//! node %USERPROFILE%\.claude\hooks\init.js
//! node   ~/.claude/hooks/init.js
//! ```
//!
//! At install time the home-style and project-style variables resolve to the
//! same physical directory, so all of the above are one logical hook.
//! [`normalize`] maps them onto a single canonical spelling, and it is the only
//! equality check the settings merger uses for hooks.
//!
//! Rules, applied in order:
//! 1. Strip quotes that wrap a path-variable reference (`"$HOME"/x` -> `$HOME/x`)
//! 2. Rewrite every home-style or project-style variable spelling to `$HOME`
//! 3. Convert `\` separators to `/`
//! 4. Collapse whitespace runs and trim

use regex::{NoExpand, Regex};
use std::sync::LazyLock;

/// Canonical token every scope variable is rewritten to
pub const CANONICAL_HOME: &str = "$HOME";

/// Variables that resolve to the install root in one scope or another
const SCOPE_VARIABLES: &str = "HOME|USERPROFILE|CLAUDE_PROJECT_DIR";

/// Any variable reference in shell, PowerShell or cmd syntax, or a bare `~`
const VARIABLE_REF: &str = r"(?:\$\{[A-Za-z_][A-Za-z0-9_]*\}|(?i:\$env:)[A-Za-z_][A-Za-z0-9_]*|\$[A-Za-z_][A-Za-z0-9_]*|%[A-Za-z_][A-Za-z0-9_]*%|~)";

static DOUBLE_QUOTED_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r#""({}[^"]*)""#, VARIABLE_REF)).expect("valid double-quote regex")
});

static SINGLE_QUOTED_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"'({}[^']*)'", VARIABLE_REF)).expect("valid single-quote regex")
});

static SCOPE_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\$\{{(?:{vars})\}}|(?i:\$env:(?:{vars}))\b|(?i:%(?:{vars})%)|\$(?:{vars})\b",
        vars = SCOPE_VARIABLES
    ))
    .expect("valid scope variable regex")
});

/// Canonicalize a command string
///
/// Total and pure: any input yields a string, empty input yields an empty
/// string, and `normalize(&normalize(c)) == normalize(c)`.
pub fn normalize(command: &str) -> String {
    if command.trim().is_empty() {
        return String::new();
    }

    let unquoted = DOUBLE_QUOTED_VAR.replace_all(command, "$1");
    let unquoted = SINGLE_QUOTED_VAR.replace_all(&unquoted, "$1");

    let unified = SCOPE_VAR.replace_all(&unquoted, NoExpand(CANONICAL_HOME));
    let unified = expand_tilde(&unified);

    let separated = unified.replace('\\', "/");

    separated.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rewrite `~` to `$HOME` where it starts a path token
///
/// A tilde counts when it begins a whitespace-separated token and is followed
/// by a separator, whitespace or the end of input.
fn expand_tilde(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev: Option<char> = None;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        let starts_token = prev.is_none_or(char::is_whitespace);
        let ends_prefix = chars
            .peek()
            .is_none_or(|next| *next == '/' || *next == '\\' || next.is_whitespace());

        if c == '~' && starts_token && ends_prefix {
            out.push_str(CANONICAL_HOME);
        } else {
            out.push(c);
        }
        prev = Some(c);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_and_project_variables_equal() {
        let global = normalize(r#"node "$HOME"/.claude/hooks/init.js"#);
        let project = normalize(r#"node "$CLAUDE_PROJECT_DIR"/.claude/hooks/init.js"#);

        assert_eq!(global, project);
        assert_eq!(global, "node $HOME/.claude/hooks/init.js");
    }

    #[test]
    fn test_braced_and_windows_spellings() {
        let expected = "node $HOME/.claude/hooks/init.js";
        assert_eq!(normalize("node ${HOME}/.claude/hooks/init.js"), expected);
        assert_eq!(normalize("node ${CLAUDE_PROJECT_DIR}/.claude/hooks/init.js"), expected);
        assert_eq!(normalize(r"node %USERPROFILE%\.claude\hooks\init.js"), expected);
        assert_eq!(normalize(r#"node "%USERPROFILE%\.claude\hooks\init.js""#), expected);
        assert_eq!(normalize(r"node $env:USERPROFILE\.claude\hooks\init.js"), expected);
        assert_eq!(normalize(r"node %userprofile%\.claude\hooks\init.js"), expected);
    }

    #[test]
    fn test_tilde_expands_to_home() {
        assert_eq!(
            normalize("node ~/.claude/hooks/init.js"),
            "node $HOME/.claude/hooks/init.js"
        );
        assert_eq!(normalize("cd ~"), "cd $HOME");
        // Not a path prefix, left alone
        assert_eq!(normalize("echo a~b"), "echo a~b");
    }

    #[test]
    fn test_quoted_full_path() {
        assert_eq!(
            normalize(r#"python3 "$CLAUDE_PROJECT_DIR/.claude/hooks/lint.py""#),
            "python3 $HOME/.claude/hooks/lint.py"
        );
        assert_eq!(
            normalize("bash '$HOME/.claude/hooks/x.sh'"),
            "bash $HOME/.claude/hooks/x.sh"
        );
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(
            normalize("  node\t\t$HOME/.claude/a.js   --flag  "),
            "node $HOME/.claude/a.js --flag"
        );
    }

    #[test]
    fn test_other_variables_kept() {
        assert_eq!(normalize(r#"node "$TOOL_DIR"/run.js"#), "node $TOOL_DIR/run.js");
        // Only whole variable names are unified
        assert_eq!(normalize("echo $HOME_DIR/x"), "echo $HOME_DIR/x");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t\n"), "");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            r#"node "$HOME"/.claude/hooks/init.js"#,
            r#"node "$CLAUDE_PROJECT_DIR"/.claude/hooks/init.js"#,
            r"node %USERPROFILE%\.claude\hooks\init.js",
            "~ ~ ~/a",
            r#"echo "~/x" '~' "hi"$HOME"x""#,
            r#"node "~/.claude/a.js""#,
            "  multiple   spaces\there  ",
            r#"\"$HOME\" escaped"#,
            "",
        ];

        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_distinct_paths_stay_distinct() {
        assert_eq!(
            normalize(r#"node "$HOME"/.claude/hooks/init.js"#),
            normalize(r"node %CLAUDE_PROJECT_DIR%\.claude\hooks\init.js")
        );
        assert_ne!(normalize("node a.js"), normalize("node b.js"));
        // The variable survives; an absolute path is a different hook
        assert_ne!(normalize("node $HOME/x.js"), normalize("node /x.js"));
        assert_eq!(normalize("node ${HOME}/a.js"), "node $HOME/a.js");
    }
}
