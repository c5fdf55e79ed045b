use std::path::PathBuf;

use rmcp::{
    ServiceExt,
    model::CallToolRequestParams,
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use serde_json::json;

fn setup_fixture(root: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let rules = root.join("rules");
    std::fs::create_dir_all(&rules)?;
    std::fs::write(
        rules.join("errors.md"),
        "# Error handling\nCategory: style\nPriority: critical\n\nWrap errors with context.\n",
    )?;

    let todos = root.join("todos");
    std::fs::create_dir_all(&todos)?;
    std::fs::write(
        todos.join("auth.md"),
        "# Feature: Auth\n\n- [ ] add login\n",
    )?;

    Ok(())
}

#[tokio::test]
async fn mcp_stdio_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
    let tempdir = tempfile::tempdir()?;
    setup_fixture(tempdir.path())?;

    let bin = lorebook_bin()?;
    let transport = TokioChildProcess::new(
        tokio::process::Command::new(bin).configure(|cmd| {
            cmd.arg("serve").arg("--root").arg(tempdir.path());
        }),
    )?;

    let client = ().serve(transport).await?;

    let args = json!({ "search": "errors" });
    let result = client
        .peer()
        .call_tool(
            CallToolRequestParams::new("lore_get_rules")
                .with_arguments(args.as_object().unwrap().clone()),
        )
        .await?;

    let structured = result.structured_content.expect("structured content");
    let rules = structured
        .get("rules")
        .and_then(|v| v.as_array())
        .expect("rules array");
    assert_eq!(rules.len(), 1);
    assert_eq!(
        rules[0].get("title").and_then(|v| v.as_str()),
        Some("Error handling")
    );

    let args = json!({ "action": "progress" });
    let result = client
        .peer()
        .call_tool(
            CallToolRequestParams::new("lore_manage_todos")
                .with_arguments(args.as_object().unwrap().clone()),
        )
        .await?;

    let structured = result.structured_content.expect("structured content");
    assert_eq!(structured.get("total").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(
        structured.get("completed").and_then(|v| v.as_u64()),
        Some(0)
    );

    client.cancel().await?;
    Ok(())
}

fn lorebook_bin() -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Ok(bin) = std::env::var("CARGO_BIN_EXE_lorebook") {
        return Ok(PathBuf::from(bin));
    }

    let mut path = std::env::current_exe()?;
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("lorebook");

    if cfg!(windows) {
        path.set_extension("exe");
    }

    Ok(path)
}
