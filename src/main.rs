use clap::Parser;
use tracing_subscriber::EnvFilter;

use lorebook::{
    cli::{Cli, Command},
    domain::Domain,
    error,
    mcp,
    store::StoreSet,
    workspace::Workspace,
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("LOREBOOK_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // stdout carries the MCP transport, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Serve => {
            let workspace = Workspace::resolve(cli.root.as_deref())?;
            mcp::run_server(workspace)
        }
        Command::Status(args) => {
            let workspace = Workspace::resolve(cli.root.as_deref())?;
            cmd_status(&workspace, args.json)
        }
        Command::Completions(args) => {
            args.generate();
            Ok(())
        }
    }
}

fn cmd_status(workspace: &Workspace, json: bool) -> error::Result<()> {
    let stores = StoreSet::open(workspace)?;
    stores.reload_all()?;

    let mut counts: Vec<(Domain, u64)> = Vec::with_capacity(Domain::ALL.len());
    for domain in Domain::ALL {
        counts.push((domain, stores.engine().document_count(domain)?));
    }

    if json {
        println!("{}", status_json(workspace.root(), &counts));
    } else {
        println!("Lore directory: {}", workspace.root().display());
        for (domain, count) in &counts {
            println!("  {domain}: {count} document(s)");
        }
    }
    Ok(())
}

fn status_json(
    root: &std::path::Path,
    counts: &[(Domain, u64)],
) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    object.insert(
        "root".to_string(),
        serde_json::Value::from(root.display().to_string()),
    );
    for (domain, count) in counts {
        object.insert(domain.to_string(), serde_json::Value::from(*count));
    }
    serde_json::Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_json_escapes_awkward_paths() {
        let root = std::path::Path::new(r#"/tmp/lore "quoted"\dir"#);
        let rendered =
            status_json(root, &[(Domain::Rules, 3), (Domain::Todos, 0)])
                .to_string();

        let parsed: serde_json::Value =
            serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["root"], r#"/tmp/lore "quoted"\dir"#);
        assert_eq!(parsed["rules"], 3);
        assert_eq!(parsed["todos"], 0);
    }
}
