use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _, Result};
use clap::{Parser, Subcommand};
use shelvediff_core::api::{RowStatus, ShelvesetInfo, ShelvesetSnapshot};
use shelvediff_core::hosts::{
    ConfigStore, InlineDispatcher, ProcessLauncher, SystemLauncher, TomlToolStore,
};
use shelvediff_core::repository::{WORKSPACE_ID, WORKSPACE_NAME};
use shelvediff_core::{
    expand_arguments, lookup_extension, normalize, resolve, ComparerContext, GitStashBackend,
    RowFilter, SessionOptions, ToolArguments,
};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

#[derive(Parser)]
#[command(
    name = "shelvediff",
    version,
    about = "Compare the pending changes of two shelvesets",
    long_about = "Lists shelvesets (git stashes), pairs the files they touch by path, \
    and opens the configured external diff tool on any pair."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "diff",
        about = "Launch the configured diff tool on two local files",
        long_about = "Looks up the tool by the left file's extension (falling back to the \
        right file's, then to the \"*\" entry) and starts it with the expanded argument template."
    )]
    Diff {
        #[arg(index = 1, help = "Left file")]
        left: String,
        #[arg(index = 2, help = "Right file")]
        right: String,
        #[arg(index = 3, help = "Label for the left file")]
        left_label: String,
        #[arg(index = 4, help = "Label for the right file")]
        right_label: String,
    },
    #[command(name = "list", about = "List shelvesets, newest first")]
    List {
        #[arg(short, long, default_value = ".", help = "Repository path")]
        repo: PathBuf,
        #[arg(short, long, help = "Owner to list; defaults to the configured git user")]
        owner: Option<String>,
        #[arg(long, help = "Second owner whose shelvesets are appended")]
        second_owner: Option<String>,
    },
    #[command(
        name = "rows",
        about = "Show the comparison rows of two shelvesets",
        long_about = "Shelvesets are given as `pending`, `stash@{n}`, a stash message, \
        or an object id prefix."
    )]
    Rows {
        #[arg(index = 1)]
        left: String,
        #[arg(index = 2)]
        right: String,
        #[arg(short, long, default_value = ".", help = "Repository path")]
        repo: PathBuf,
        #[arg(short, long, help = "Only show rows whose path contains this text")]
        filter: Option<String>,
    },
    #[command(name = "compare", about = "Compare one file of two shelvesets")]
    Compare {
        #[arg(index = 1)]
        left: String,
        #[arg(index = 2)]
        right: String,
        #[arg(index = 3, help = "Path of the file, matched case-insensitively")]
        path: String,
        #[arg(short, long, default_value = ".", help = "Repository path")]
        repo: PathBuf,
    },
}

fn main() -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Diff {
            left,
            right,
            left_label,
            right_label,
        } => diff(&left, &right, &left_label, &right_label),
        Commands::List {
            repo,
            owner,
            second_owner,
        } => {
            let (context, _) = open_context(&repo)?;
            let listed = context.shelvesets(owner.as_deref(), second_owner.as_deref())?;
            for info in listed {
                println!(
                    "{}\t{}\t{}\t{}",
                    short_id(&info.id),
                    info.created_at,
                    info.owner,
                    info.name
                );
            }
            Ok(())
        }
        Commands::Rows {
            left,
            right,
            repo,
            filter,
        } => {
            let (context, backend) = open_context(&repo)?;
            let left = snapshot(&context, &backend, &left)?;
            let right = snapshot(&context, &backend, &right)?;
            let rows = context.rows(&left, &right);
            let filter = RowFilter::new(filter.as_deref().unwrap_or_default());
            for row in filter.apply(&rows) {
                let marker = match row.status() {
                    RowStatus::LeftOnly => "<",
                    RowStatus::RightOnly => ">",
                    RowStatus::Both => "=",
                };
                println!("{marker}\t{}\t{}", row.left_path(), row.right_path());
            }
            Ok(())
        }
        Commands::Compare {
            left,
            right,
            path,
            repo,
        } => {
            let (context, backend) = open_context(&repo)?;
            let left = snapshot(&context, &backend, &left)?;
            let right = snapshot(&context, &backend, &right)?;
            let key = normalize(&path);
            let row = context
                .rows(&left, &right)
                .into_iter()
                .find(|row| row.key == key.as_str())
                .ok_or_else(|| anyhow!("'{path}' is not changed in either shelveset"))?;

            let outcome = context.compare(&row)?;
            match outcome.tool {
                Some(tool) => println!("launched {} {}", tool.command, tool.arguments),
                None => println!("opened {}", outcome.caption),
            }
            Ok(())
        }
    }
}

/// Entry point used when a host relaunches the tool with two prepared files.
fn diff(left: &str, right: &str, left_label: &str, right_label: &str) -> Result<()> {
    let config = ConfigStore::new()?.load_or_create_default()?;
    let tools = TomlToolStore::from_config(&config);

    let extension = lookup_extension(left, right);
    let Some(tool) = resolve(&extension, &tools) else {
        bail!("no diff tool configured for '{extension}'");
    };

    let arguments = expand_arguments(
        &tool.arguments_template,
        &ToolArguments {
            left_path: left,
            right_path: right,
            left_label,
            right_label,
        },
    );
    SystemLauncher
        .launch(&tool.command, &arguments)
        .with_context(|| format!("failed to launch {}", tool.command))?;
    Ok(())
}

fn open_context(repo: &std::path::Path) -> Result<(ComparerContext, Arc<GitStashBackend>)> {
    let config = ConfigStore::new()?.load_or_create_default()?;
    let backend = Arc::new(
        GitStashBackend::open(repo)
            .with_context(|| format!("failed to open repository at {}", repo.display()))?,
    );
    // Deferred cleanup must finish before the process exits.
    let context = ComparerContext::builder(
        backend.clone(),
        Arc::new(TomlToolStore::from_config(&config)),
        Arc::new(SystemLauncher),
    )
    .dispatcher(Arc::new(InlineDispatcher))
    .options(SessionOptions::from_config(&config))
    .build();
    Ok((context, backend))
}

fn snapshot(
    context: &ComparerContext,
    backend: &GitStashBackend,
    spec: &str,
) -> Result<ShelvesetSnapshot> {
    if spec.eq_ignore_ascii_case(WORKSPACE_ID) {
        let empty = ShelvesetSnapshot::new(
            ShelvesetInfo::new(WORKSPACE_ID, WORKSPACE_NAME, "", 0),
            Vec::new(),
        );
        return Ok(context.workspace_snapshot()?.unwrap_or(empty));
    }

    let info = backend
        .find_shelveset(spec)
        .with_context(|| format!("unknown shelveset '{spec}'"))?;
    Ok(context.snapshot(&info)?)
}

fn short_id(id: &str) -> &str {
    id.get(..10).unwrap_or(id)
}
