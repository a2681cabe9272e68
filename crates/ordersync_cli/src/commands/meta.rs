//! `completions` and `man`: generated from the clap command tree, so they
//! never drift from the parser.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::CommandFactory;

use crate::Cli;

const BIN_NAME: &str = "ordersync";

fn render_completions(shell: clap_complete::Shell, out: &mut dyn Write) {
    clap_complete::generate(shell, &mut Cli::command(), BIN_NAME, out);
}

fn render_overview_page(out: &mut dyn Write) -> std::io::Result<()> {
    clap_mangen::Man::new(Cli::command()).render(out)
}

/// One page per visible subcommand plus the overview page.
fn write_man_pages(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    clap_mangen::generate_to(Cli::command(), dir)
}

pub(crate) fn handle_completions(
    shell: clap_complete::Shell,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout().lock();
    render_completions(shell, &mut stdout);
    stdout.flush()?;
    Ok(())
}

pub(crate) fn handle_man(output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(dir) = output else {
        let mut stdout = std::io::stdout().lock();
        render_overview_page(&mut stdout)?;
        stdout.flush()?;
        return Ok(());
    };

    write_man_pages(&dir)?;
    tracing::info!(dir = %dir.display(), "Man pages written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn completions(shell: clap_complete::Shell) -> String {
        let mut out = Vec::new();
        render_completions(shell, &mut out);
        String::from_utf8(out).expect("completion output should be UTF-8")
    }

    fn scratch_dir(label: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock should be after epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("ordersync-{label}-{}-{nanos}", std::process::id()))
    }

    #[test]
    fn completions_offer_sync_subcommands_and_flags() {
        let script = completions(clap_complete::Shell::Bash);
        for word in ["start", "progress", "reset", "work", "migrate"] {
            assert!(script.contains(word), "bash completions should offer `{word}`");
        }
        assert!(script.contains("--force"));
        assert!(script.contains("--once"));
        assert!(script.contains("--watch"));
    }

    #[test]
    fn overview_page_describes_the_sync() {
        let mut out = Vec::new();
        render_overview_page(&mut out).expect("man rendering should succeed");
        let page = String::from_utf8(out).expect("man output should be UTF-8");

        assert!(page.to_lowercase().contains(".th ordersync"));
        assert!(page.contains("WooCommerce"));
    }

    #[test]
    fn man_directory_gets_a_page_per_visible_subcommand() {
        let dir = scratch_dir("man");
        handle_man(Some(dir.clone())).expect("man page generation should succeed");

        for page in ["ordersync.1", "ordersync-start.1", "ordersync-work.1", "ordersync-reset.1"] {
            assert!(dir.join(page).is_file(), "{page} should be generated");
        }
        assert!(!dir.join("ordersync-run-chunk.1").exists());

        std::fs::remove_dir_all(&dir).expect("test output directory should be removable");
    }
}
