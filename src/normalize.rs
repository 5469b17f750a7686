//! Candidate → `Command`.
//!
//! Total by construction: every input, however malformed, ends up as one of
//! the five command shapes, with path fields pinned under the sandbox root.

use crate::command::{Command, ToolKind};
use crate::intent::Candidate;
use crate::sandbox::Sandbox;
use serde_json::{Map, Value};
use tracing::{debug, info};

pub const DEFAULT_FILE_NAME: &str = "new.txt";
pub const DEFAULT_FOLDER_NAME: &str = "new_folder";
pub const DEFAULT_SUMMARY_TARGET: &str = "unknown.txt";
pub const DEFAULT_MOVE_SOURCE: &str = "unknown.txt";
pub const DEFAULT_TOP_K: usize = 100;
pub const DEFAULT_MAX_TOKENS: usize = 200;

/// Argument spellings folded into the canonical names before anything else.
const SYNONYMS: [(&str, &str); 2] = [("source", "src"), ("destination", "dst")];

/// Reclassification for unknown tool names, checked in order. The first rule
/// sharing a key with the arguments wins; no match means `CreateFile`.
///
/// Best effort only: this picks a safe shape, it does not guess intent well.
const RECLASSIFY_RULES: &[(&[&str], ToolKind)] = &[(
    &["src", "dst", "source", "destination", "file", "folder"],
    ToolKind::MoveFile,
)];

const RECLASSIFY_DEFAULT: ToolKind = ToolKind::CreateFile;

pub fn normalize(candidate: &Candidate, sandbox: &Sandbox) -> Command {
    let mut args = candidate.arguments().cloned().unwrap_or_default();

    for (from, to) in SYNONYMS {
        if let Some(v) = args.get(from).cloned() {
            args.insert(to.to_string(), v);
        }
    }

    let kind = resolve_tool(candidate.tool(), &args);

    let command = match kind {
        ToolKind::CreateFile => create_file(&args, sandbox),
        ToolKind::CreateFolder => create_folder(&args),
        ToolKind::MoveFile => move_file(&args, sandbox),
        ToolKind::SearchFiles => search_files(&args),
        ToolKind::SummarizeFile => summarize_file(&args, sandbox),
    };
    debug!(command = ?command, "normalized");
    command
}

/// Exact name match, otherwise the rule table.
pub fn resolve_tool(name: Option<&str>, args: &Map<String, Value>) -> ToolKind {
    if let Some(kind) = name.map(str::trim).and_then(ToolKind::from_name) {
        return kind;
    }

    let kind = RECLASSIFY_RULES
        .iter()
        .find(|(keys, _)| keys.iter().any(|k| args.contains_key(*k)))
        .map(|(_, kind)| *kind)
        .unwrap_or(RECLASSIFY_DEFAULT);
    info!(requested = ?name, resolved = %kind, "reclassified unknown tool");
    kind
}

fn create_file(args: &Map<String, Value>, sandbox: &Sandbox) -> Command {
    // path가 비어 있을 때만 name을 씀
    let raw = match (text(args, "path"), text(args, "name")) {
        (None, Some(name)) => name,
        (Some(path), _) => path,
        (None, None) => DEFAULT_FILE_NAME.to_string(),
    };
    Command::CreateFile {
        path: sandbox.resolve(&raw, DEFAULT_FILE_NAME),
        content: content(args),
    }
}

fn create_folder(args: &Map<String, Value>) -> Command {
    let raw = text(args, "name").unwrap_or_default();
    let name = Sandbox::basename(&raw).unwrap_or(DEFAULT_FOLDER_NAME);
    Command::CreateFolder {
        name: name.to_string(),
    }
}

fn move_file(args: &Map<String, Value>, sandbox: &Sandbox) -> Command {
    if let (Some(file), Some(folder)) = (text(args, "file"), text(args, "folder")) {
        let file_name = Sandbox::basename(&file).unwrap_or(DEFAULT_MOVE_SOURCE);
        let dst_dir = sandbox.resolve(&folder, DEFAULT_FOLDER_NAME);
        return Command::MoveFile {
            src: sandbox.root().join(file_name),
            dst: dst_dir.join(file_name),
            dry_run: false,
        };
    }

    let src_raw = text(args, "src").unwrap_or_default();
    let src_name = Sandbox::basename(&src_raw).unwrap_or(DEFAULT_MOVE_SOURCE);
    let dst_raw = text(args, "dst").unwrap_or_default();
    Command::MoveFile {
        src: sandbox.root().join(src_name),
        dst: sandbox.resolve_move_destination(src_name, &dst_raw),
        dry_run: flag(args.get("dry_run")),
    }
}

fn search_files(args: &Map<String, Value>) -> Command {
    let keywords = list(args.get("keywords"));
    let ext = list(args.get("ext"))
        .into_iter()
        .map(|e| {
            let e = e.to_lowercase();
            if e.starts_with('.') { e } else { format!(".{e}") }
        })
        .collect();
    Command::SearchFiles {
        keywords,
        ext,
        top_k: positive(args.get("top_k")).unwrap_or(DEFAULT_TOP_K),
    }
}

fn summarize_file(args: &Map<String, Value>, sandbox: &Sandbox) -> Command {
    let raw = text(args, "path").unwrap_or_default();
    Command::SummarizeFile {
        path: sandbox.resolve(&raw, DEFAULT_SUMMARY_TARGET),
        max_tokens: positive(args.get("max_tokens")).unwrap_or(DEFAULT_MAX_TOKENS),
    }
}

/// Non-empty scalar rendered as text.
fn text(args: &Map<String, Value>, key: &str) -> Option<String> {
    let s = match args.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn content(args: &Map<String, Value>) -> String {
    match args.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Only an explicit true counts.
fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn list(value: Option<&Value>) -> Vec<String> {
    let scalar = |v: &Value| match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    let items: Vec<String> = match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar).collect(),
        Some(v) => scalar(v).into_iter().collect(),
        None => Vec::new(),
    };
    items.into_iter().filter(|s| !s.is_empty()).collect()
}

fn positive(value: Option<&Value>) -> Option<usize> {
    let n = match value? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f > 0.0).map(|f| f as u64))?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    usize::try_from(n).ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sandbox() -> (tempfile::TempDir, Sandbox) {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path().join("root")).unwrap();
        (dir, sandbox)
    }

    fn run(value: Value, sandbox: &Sandbox) -> Command {
        normalize(&Candidate::new(value), sandbox)
    }

    #[test]
    fn create_folder_passes_through() {
        let (_d, sb) = sandbox();
        let cmd = run(
            json!({"tool": "create_folder", "arguments": {"name": "down"}}),
            &sb,
        );
        assert_eq!(cmd, Command::CreateFolder { name: "down".into() });
    }

    #[test]
    fn create_folder_keeps_basename_only() {
        let (_d, sb) = sandbox();
        let cmd = run(
            json!({"tool": "create_folder", "arguments": {"name": "../../etc/down"}}),
            &sb,
        );
        assert_eq!(cmd, Command::CreateFolder { name: "down".into() });

        let cmd = run(json!({"tool": "create_folder", "arguments": {"name": ".."}}), &sb);
        assert_eq!(cmd, Command::CreateFolder { name: DEFAULT_FOLDER_NAME.into() });
    }

    #[test]
    fn create_file_prefers_name_when_path_missing() {
        let (_d, sb) = sandbox();
        let cmd = run(
            json!({"tool": "create_file", "arguments": {"name": "memo.txt", "path": ""}}),
            &sb,
        );
        assert_eq!(
            cmd,
            Command::CreateFile {
                path: sb.root().join("memo.txt"),
                content: String::new()
            }
        );

        let cmd = run(
            json!({"tool": "create_file", "arguments": {"name": "x.txt", "path": "/etc/y.txt", "content": "hi"}}),
            &sb,
        );
        assert_eq!(
            cmd,
            Command::CreateFile {
                path: sb.root().join("y.txt"),
                content: "hi".into()
            }
        );
    }

    #[test]
    fn fallback_candidate_normalizes_under_root() {
        let (_d, sb) = sandbox();
        let cmd = normalize(&Candidate::fallback(), &sb);
        assert_eq!(
            cmd,
            Command::CreateFile {
                path: sb.root().join("new.txt"),
                content: String::new()
            }
        );
    }

    #[test]
    fn source_destination_synonyms_fold_into_src_dst() {
        let (_d, sb) = sandbox();
        let cmd = run(
            json!({"tool": "move_file", "arguments": {"source": "a.txt", "destination": "down"}}),
            &sb,
        );
        assert_eq!(
            cmd,
            Command::MoveFile {
                src: sb.root().join("a.txt"),
                dst: sb.root().join("down").join("a.txt"),
                dry_run: false
            }
        );
    }

    #[test]
    fn move_file_from_file_and_folder() {
        let (_d, sb) = sandbox();
        let cmd = run(
            json!({"tool": "move_file", "arguments": {"file": "/x/a.txt", "folder": "down", "dry_run": true}}),
            &sb,
        );
        assert_eq!(
            cmd,
            Command::MoveFile {
                src: sb.root().join("a.txt"),
                dst: sb.root().join("down").join("a.txt"),
                dry_run: false
            }
        );
        // 정규화 단계에서는 디렉터리를 만들지 않음
        assert!(!sb.root().join("down").exists());
    }

    #[test]
    fn move_file_dry_run_only_when_explicitly_true() {
        let (_d, sb) = sandbox();
        for (value, expected) in [
            (json!(true), true),
            (json!("TRUE"), true),
            (json!(false), false),
            (json!("yes"), false),
            (json!(1), false),
        ] {
            let cmd = run(
                json!({"tool": "move_file", "arguments": {"src": "a.txt", "dst": "b.txt", "dry_run": value}}),
                &sb,
            );
            match cmd {
                Command::MoveFile { dry_run, dst, .. } => {
                    assert_eq!(dry_run, expected);
                    assert_eq!(dst, sb.root().join("b.txt"));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_tool_with_move_hints_becomes_move() {
        let (_d, sb) = sandbox();
        let cmd = run(
            json!({"tool": "relocate", "arguments": {"file": "a.txt", "folder": "down"}}),
            &sb,
        );
        assert_eq!(cmd.kind(), ToolKind::MoveFile);
    }

    #[test]
    fn unknown_or_missing_tool_becomes_create_file() {
        let (_d, sb) = sandbox();
        for value in [
            json!({"tool": "delete_file", "arguments": {"path": "a.txt"}}),
            json!({"arguments": {"name": "x"}}),
            json!({"tool": 42, "arguments": "nonsense"}),
            json!({}),
            json!([1, 2]),
            json!(null),
        ] {
            assert_eq!(run(value, &sb).kind(), ToolKind::CreateFile);
        }
    }

    #[test]
    fn search_coerces_scalars_and_defaults() {
        let (_d, sb) = sandbox();
        let cmd = run(
            json!({"tool": "search_files", "arguments": {"keywords": "report", "ext": "TXT", "top_k": "5"}}),
            &sb,
        );
        assert_eq!(
            cmd,
            Command::SearchFiles {
                keywords: vec!["report".into()],
                ext: vec![".txt".into()],
                top_k: 5
            }
        );

        let cmd = run(json!({"tool": "search_files"}), &sb);
        assert_eq!(
            cmd,
            Command::SearchFiles {
                keywords: vec![],
                ext: vec![],
                top_k: DEFAULT_TOP_K
            }
        );
    }

    #[test]
    fn search_top_k_must_be_positive() {
        let (_d, sb) = sandbox();
        for top_k in [json!(0), json!(-3), json!("many"), json!(2.5), json!(null)] {
            let cmd = run(
                json!({"tool": "search_files", "arguments": {"top_k": top_k}}),
                &sb,
            );
            assert!(matches!(cmd, Command::SearchFiles { top_k: DEFAULT_TOP_K, .. }));
        }
        let cmd = run(
            json!({"tool": "search_files", "arguments": {"top_k": 3.0}}),
            &sb,
        );
        assert!(matches!(cmd, Command::SearchFiles { top_k: 3, .. }));
    }

    #[test]
    fn summarize_defaults() {
        let (_d, sb) = sandbox();
        let cmd = run(
            json!({"tool": "summarize_file", "arguments": {"path": "./filetalk_root/notes.md"}}),
            &sb,
        );
        assert_eq!(
            cmd,
            Command::SummarizeFile {
                path: sb.root().join("notes.md"),
                max_tokens: DEFAULT_MAX_TOKENS
            }
        );
    }

    #[test]
    fn every_path_stays_inside_the_root() {
        let (_d, sb) = sandbox();
        let hostile = ["../../etc/passwd", "/etc/shadow", "..", "C:\\Windows\\system.ini", ""];
        for raw in hostile {
            let inputs = [
                json!({"tool": "create_file", "arguments": {"path": raw}}),
                json!({"tool": "create_folder", "arguments": {"name": raw}}),
                json!({"tool": "move_file", "arguments": {"src": raw, "dst": raw}}),
                json!({"tool": "move_file", "arguments": {"file": raw, "folder": "../out"}}),
                json!({"tool": "summarize_file", "arguments": {"path": raw}}),
            ];
            for input in inputs {
                match run(input, &sb) {
                    Command::CreateFile { path, .. } | Command::SummarizeFile { path, .. } => {
                        assert!(sb.contains(&path), "{path:?}");
                    }
                    Command::CreateFolder { name } => {
                        assert_eq!(sb.root().join(&name).parent(), Some(sb.root()));
                    }
                    Command::MoveFile { src, dst, .. } => {
                        assert!(sb.contains(&src), "{src:?}");
                        assert!(sb.contains(&dst), "{dst:?}");
                    }
                    Command::SearchFiles { .. } => unreachable!(),
                }
            }
        }
    }
}
