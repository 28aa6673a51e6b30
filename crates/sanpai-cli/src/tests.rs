use std::path::PathBuf;

use super::*;

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["sanpai"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
    assert!(cli.session.is_none());
}

#[test]
fn parses_links_with_defaults() {
    let cli = Cli::try_parse_from(["sanpai", "links"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Links {
            target: TargetArgs {
                url: None,
                keyword: None
            }
        })
    ));
}

#[test]
fn parses_crawl_overrides() {
    let cli = Cli::try_parse_from([
        "sanpai",
        "crawl",
        "--url",
        "https://ex.test/list.html",
        "--keyword",
        "",
        "--batch-size",
        "3",
        "--output",
        "out.xlsx",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Crawl {
            target: TargetArgs {
                url: Some(ref u),
                keyword: Some(ref k),
            },
            batch_size: Some(3),
            api_key: None,
            output: Some(ref o),
        }) if u == "https://ex.test/list.html" && k.is_empty() && o == &PathBuf::from("out.xlsx")
    ));
}

#[test]
fn crawl_rejects_zero_batch_size() {
    assert!(Cli::try_parse_from(["sanpai", "crawl", "--batch-size", "0"]).is_err());
}

#[test]
fn extract_requires_at_least_one_file() {
    assert!(Cli::try_parse_from(["sanpai", "extract"]).is_err());

    let cli = Cli::try_parse_from(["sanpai", "extract", "a.pdf", "b.xlsx", "--api-key", "k"])
        .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Extract { ref files, api_key: Some(ref key) })
            if files.len() == 2 && key == "k"
    ));
}

#[test]
fn export_requires_output() {
    assert!(Cli::try_parse_from(["sanpai", "export"]).is_err());
    let cli = Cli::try_parse_from(["sanpai", "export", "-o", "ledger.xlsx"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Export { .. })));
}

#[test]
fn session_flag_is_global() {
    let cli = Cli::try_parse_from(["sanpai", "status", "--session", "/tmp/s.json"]).unwrap();
    assert_eq!(cli.session, Some(PathBuf::from("/tmp/s.json")));
    assert!(matches!(cli.command, Some(Commands::Status)));
}

#[test]
fn parses_audit_and_reset() {
    let cli = Cli::try_parse_from(["sanpai", "audit", "--keyword", "06"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Audit {
            target: TargetArgs { keyword: Some(ref k), .. }
        }) if k == "06"
    ));
    let cli = Cli::try_parse_from(["sanpai", "reset"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Reset)));
}

#[test]
fn help_is_answered_by_the_parser_for_every_level() {
    let err = Cli::try_parse_from(["sanpai", "--help"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);

    let err = Cli::try_parse_from(["sanpai", "crawl", "--help"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
}
