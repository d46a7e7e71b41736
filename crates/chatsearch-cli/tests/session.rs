use std::path::{Path, PathBuf};

use chatsearch_cli::cli::{run, CliConfig, SearchArgs, SessionCommand};
use chatsearch_core::memory::MemoryDataset;
use chatsearch_core::models::{PeerId, PeersFilter};
use chatsearch_core::Section;

fn demo_fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/fixture.json")
}

#[test]
fn test_demo_fixture_parses() {
    let dataset = MemoryDataset::load(&demo_fixture()).unwrap();
    assert!(dataset.chats.iter().any(|chat| chat.contact));
    assert_eq!(dataset.top_peers, Some(vec![PeerId(2), PeerId(10)]));
    assert_eq!(dataset.latency.remote_peers_ms, 180);
}

#[test]
fn test_search_session_runs() {
    let command = SessionCommand::Search(SearchArgs {
        keystrokes: vec!["a".to_string(), "an".to_string(), "ann".to_string()],
        expand: vec![Section::LocalPeers],
        load_more: 1,
        filter: PeersFilter::empty(),
        ..Default::default()
    });
    run(command, CliConfig::default(), &demo_fixture(), false).unwrap();
}

#[test]
fn test_contacts_and_recent_sessions_run() {
    let contacts = SessionCommand::Contacts {
        keystrokes: vec!["ann".to_string()],
    };
    run(contacts, CliConfig::default(), &demo_fixture(), true).unwrap();

    let recent = SessionCommand::Recent {
        open: vec![PeerId(2)],
        remove: vec![PeerId(3)],
        clear: false,
    };
    run(recent, CliConfig::default(), &demo_fixture(), false).unwrap();
}

#[test]
fn test_missing_fixture_is_an_error() {
    let command = SessionCommand::Contacts {
        keystrokes: vec!["ann".to_string()],
    };
    let error = run(
        command,
        CliConfig::default(),
        Path::new("/nonexistent/fixture.json"),
        false,
    )
    .unwrap_err();
    assert!(error.to_string().contains("Failed to load fixture"));
}

#[test]
fn test_unknown_scoped_peer_is_an_error() {
    let command = SessionCommand::Search(SearchArgs {
        keystrokes: vec!["ann".to_string()],
        peer: Some(PeerId(999)),
        ..Default::default()
    });
    assert!(run(command, CliConfig::default(), &demo_fixture(), false).is_err());
}
