use anyhow::{Context, Result};
use clap::Parser;
use rssadd::{add_item, Fragment, Output, Source, Target};
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "rssadd", about = "Add an item to an RSS 2.0 feed")]
struct Args {
    /// Feed to read: a path, a file:// URL, inline xml, or `-` for stdin.
    /// An empty feed is used when omitted.
    #[arg(long, value_name = "SOURCE", env = "RSSADD_FROM")]
    from: Option<String>,

    /// File to write the feed to. The feed is printed when omitted.
    #[arg(long, value_name = "FILE", env = "RSSADD_TO")]
    to: Option<PathBuf>,

    /// Child element of the new item, e.g. `<title>Hello</title>`. Repeatable.
    #[arg(long = "tag", value_name = "XML")]
    tags: Vec<String>,

    /// Drop the oldest items so that at most this many remain.
    #[arg(long, value_name = "N", env = "RSSADD_MAX_ITEMS")]
    max_items: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut stdin_feed = Vec::new();
    let from = match args.from.as_deref() {
        Some("-") => {
            std::io::stdin()
                .read_to_end(&mut stdin_feed)
                .context("Failed to read feed from stdin")?;
            Some(Source::Bytes(&stdin_feed))
        }
        Some(source) => Some(Source::Text(source)),
        None => None,
    };
    let to = args.to.as_deref().map(Target::Path);
    let fragments: Vec<Fragment> = args.tags.into_iter().map(Fragment::Xml).collect();

    let output =
        add_item(from, to, &fragments, args.max_items).context("Failed to add item to feed")?;
    match output {
        Output::Bytes(bytes) => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(&bytes)?;
            handle.flush()?;
        }
        Output::Written(path) => info!(path = %path.display(), "feed written"),
        Output::Root(_) | Output::Document(_) => {}
    }
    Ok(())
}
