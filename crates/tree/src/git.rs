use std::path::Path;

const MAX_OUTPUT_LINES: usize = 5_000;

/// `ListUncommitted(root)` — local, read-only inspection of the working
/// tree's staged/unstaged/untracked files via `git status --porcelain`.
/// Mirrors the teacher's `GitStatusTool` shelling pattern: truncate output,
/// never fail the caller on a non-git directory.
pub async fn list_uncommitted(root: &Path) -> anyhow::Result<Vec<String>> {
    let (out, code) = run_git(&["status", "--porcelain"], root).await?;
    if code != 0 {
        return Ok(Vec::new());
    }
    Ok(parse_porcelain(&out))
}

/// `ListCommitFiles(root, ref, limit)` — files touched by a single commit.
pub async fn list_commit_files(
    root: &Path,
    git_ref: &str,
    limit: usize,
) -> anyhow::Result<Vec<String>> {
    let (out, code) = run_git(&["show", "--name-only", "--pretty=format:", git_ref], root).await?;
    if code != 0 {
        anyhow::bail!("git show failed for ref '{git_ref}'");
    }
    Ok(out
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(limit)
        .map(|l| l.to_string())
        .collect())
}

fn parse_porcelain(out: &str) -> Vec<String> {
    out.lines()
        .take(MAX_OUTPUT_LINES)
        .filter_map(|line| {
            if line.len() < 4 {
                return None;
            }
            Some(line[3..].to_string())
        })
        .collect()
}

async fn run_git(args: &[&str], cwd: &Path) -> anyhow::Result<(String, i32)> {
    let output = tokio::process::Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .await?;
    let code = output.status.code().unwrap_or(-1);
    let out = String::from_utf8_lossy(&output.stdout).into_owned();
    Ok((out, code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_porcelain_lines() {
        let out = " M src/lib.rs\n?? new_file.rs\n";
        let files = parse_porcelain(out);
        assert_eq!(files, vec!["src/lib.rs", "new_file.rs"]);
    }
}
