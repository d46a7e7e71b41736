use std::path::PathBuf;

use chatsearch_cli::cli::{run, CliConfig, SearchArgs, SessionCommand};
use chatsearch_core::models::{MessageTags, PeerId, PeersFilter, TimeFilter};
use chatsearch_core::tracing_setup::init_tracing_with_service;
use chatsearch_core::Section;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "chatsearch-cli")]
#[command(about = "Drive the chat search panes over a JSON fixture and print every list transition")]
struct Cli {
    /// JSON data set (chats, directory, messages, contacts)
    #[arg(long, short = 'f')]
    fixture: Option<PathBuf>,

    /// Path to JSON config file (search tunables, account, fixture)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExpandArg {
    Local,
    Global,
}

impl From<ExpandArg> for Section {
    fn from(arg: ExpandArg) -> Self {
        match arg {
            ExpandArg::Local => Section::LocalPeers,
            ExpandArg::Global => Section::GlobalPeers,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Search chats and messages, typing each argument in turn
    Search {
        /// Successive contents of the search field, e.g. `a an ann`
        #[arg(required = true)]
        keystrokes: Vec<String>,
        /// Toggle a peer section after the results settle (can be repeated)
        #[arg(long, value_enum)]
        expand: Vec<ExpandArg>,
        /// Number of further message pages to request
        #[arg(long, default_value_t = 0)]
        load_more: usize,
        /// Media tab: media, file, music, voice or link
        #[arg(long, value_parser = parse_tag)]
        tag: Option<MessageTags>,
        /// Only search messages of this chat
        #[arg(long)]
        peer: Option<i64>,
        /// Only search messages from the last 1h, 4h, 12h, 24h or 7d
        #[arg(long, value_parser = parse_time_filter)]
        last: Option<TimeFilter>,
        /// Pane opened without a recent list and add-contact row
        #[arg(long)]
        exclude_recent: bool,
        /// Search peers only
        #[arg(long)]
        no_messages: bool,
        /// Pause between keystrokes
        #[arg(long, default_value_t = 0)]
        typing_delay_ms: u64,
    },

    /// Search the contacts overlay
    Contacts {
        #[arg(required = true)]
        keystrokes: Vec<String>,
    },

    /// Show the recent list, optionally opening or removing peers
    Recent {
        /// Record a peer as opened from search (can be repeated)
        #[arg(long)]
        open: Vec<i64>,
        /// Remove a peer from the recent list (can be repeated)
        #[arg(long)]
        remove: Vec<i64>,
        /// Clear all recently searched peers
        #[arg(long)]
        clear: bool,
    },
}

fn parse_tag(value: &str) -> Result<MessageTags, String> {
    MessageTags::from_name(value).ok_or_else(|| format!("unknown media tab: {value}"))
}

fn parse_time_filter(value: &str) -> Result<TimeFilter, String> {
    TimeFilter::from_label(value).ok_or_else(|| format!("unknown time window: {value}"))
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing_with_service("chatsearch-cli") {
        eprintln!("Warning: Failed to set up logging: {}", e);
    }

    let config = match CliConfig::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Priority: --fixture > config file
    let Some(fixture) = cli.fixture.clone().or_else(|| config.fixture.clone()) else {
        eprintln!("No fixture specified. Use --fixture or set \"fixture\" in the config file.");
        std::process::exit(1);
    };

    let command = match cli.command {
        Commands::Search {
            keystrokes,
            expand,
            load_more,
            tag,
            peer,
            last,
            exclude_recent,
            no_messages,
            typing_delay_ms,
        } => {
            let mut filter = PeersFilter::empty();
            if exclude_recent {
                filter = filter | PeersFilter::EXCLUDE_RECENT;
            }
            if no_messages {
                filter = filter | PeersFilter::DO_NOT_SEARCH_MESSAGES;
            }
            SessionCommand::Search(SearchArgs {
                keystrokes,
                expand: expand.into_iter().map(Section::from).collect(),
                load_more,
                tag,
                peer: peer.map(PeerId),
                last,
                filter,
                typing_delay_ms,
            })
        }
        Commands::Contacts { keystrokes } => SessionCommand::Contacts { keystrokes },
        Commands::Recent {
            open,
            remove,
            clear,
        } => SessionCommand::Recent {
            open: open.into_iter().map(PeerId).collect(),
            remove: remove.into_iter().map(PeerId).collect(),
            clear,
        },
    };

    if let Err(e) = run(command, config, &fixture, cli.pretty) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
