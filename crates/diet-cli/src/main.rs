//! Internet Diet CLI
//!
//! Manages a rule store kept in a JSON file and runs matching, selection and
//! page scans against saved HTML.

mod file_storage;

use std::fs;
use std::path::Path;

use clap::{Parser, Subcommand, ValueEnum};
use log::debug;
use url::Url;

use diet_core::html::HtmlDocument;
use diet_core::{get_best_link_block_candidate, scan_page, BlockRule, SelectorOptions, TreeQuery};
use diet_rules::authoring::url_rule_for_link;
use diet_rules::{
    default_block_rules, dedupe_block_rules, parse_block_rules, RuleStore, StatsStore, SystemClock,
};

use crate::file_storage::FileStorage;

#[derive(Parser)]
#[command(name = "diet-cli")]
#[command(about = "Internet Diet rule store and page tools")]
struct Cli {
    /// Store file holding rules, settings and stats
    #[arg(short, long, global = true, default_value = "internet-diet.json")]
    store: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum AddKind {
    /// Block the whole host
    Host,
    /// Block paths containing a substring
    Pathname,
    /// Block a URL and everything under it
    Url,
    /// Block text containing a word
    Item,
    /// Block the path of a link
    Link,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize URLs
    Normalize {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Extract the identifier token of URLs
    CandidateId {
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Check a URL (and optionally a text item) against the stored rules
    Check {
        url: String,

        /// Text to test against item rules on the URL's host
        #[arg(short, long)]
        text: Option<String>,
    },

    /// Remove duplicate rules from a rule list file
    Dedupe {
        /// Rule list to read
        #[arg(short, long)]
        input: String,

        /// Where to write the result (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Add a rule
    Add {
        #[arg(value_enum)]
        kind: AddKind,

        hostname: String,

        /// Pathname, URL, item or link, depending on the kind
        value: Option<String>,
    },

    /// Import a rule list file into the store
    Import {
        input: String,
    },

    /// Install the default rules
    Defaults,

    /// Remove a rule by id
    Remove {
        id: String,
    },

    /// List stored rules
    List,

    /// List hostnames that have rules
    Hosts,

    /// Pause blocking
    Pause,

    /// Resume blocking
    Resume,

    /// Show blocked element totals
    Stats,

    /// Find the best link block candidate in a saved page
    Select {
        /// HTML file
        #[arg(long)]
        html: String,

        /// URL the page was saved from
        #[arg(long)]
        url: String,

        /// CSS selector of the element to start from
        #[arg(long)]
        start: String,

        /// Log every level of the walk
        #[arg(long)]
        trace: bool,
    },

    /// Report what the stored rules block in a saved page
    Scan {
        /// HTML file
        #[arg(long)]
        html: String,

        /// URL the page was saved from
        #[arg(long)]
        url: String,

        /// Add the result to the stored totals
        #[arg(long)]
        record: bool,
    },
}

type Store = RuleStore<FileStorage, SystemClock>;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let store = cli.store.as_str();

    let result = match cli.command {
        Commands::Normalize { urls } => cmd_normalize(&urls),
        Commands::CandidateId { urls } => cmd_candidate_id(&urls),
        Commands::Check { url, text } => cmd_check(store, &url, text.as_deref()),
        Commands::Dedupe { input, output } => cmd_dedupe(&input, output.as_deref()),
        Commands::Add {
            kind,
            hostname,
            value,
        } => cmd_add(store, kind, &hostname, value.as_deref()),
        Commands::Import { input } => cmd_import(store, &input),
        Commands::Defaults => cmd_defaults(store),
        Commands::Remove { id } => cmd_remove(store, &id),
        Commands::List => cmd_list(store),
        Commands::Hosts => cmd_hosts(store),
        Commands::Pause => cmd_set_paused(store, true),
        Commands::Resume => cmd_set_paused(store, false),
        Commands::Stats => cmd_stats(store),
        Commands::Select {
            html,
            url,
            start,
            trace,
        } => cmd_select(&html, &url, &start, trace),
        Commands::Scan { html, url, record } => cmd_scan(store, &html, &url, record),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn open_store(path: &str) -> Result<Store, String> {
    debug!("opening store {}", path);
    RuleStore::open(FileStorage::new(path), SystemClock)
        .map_err(|e| format!("Failed to open store '{}': {}", path, e))
}

fn read_file(path: &str) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))
}

fn cmd_normalize(urls: &[String]) -> Result<(), String> {
    for url in urls {
        println!("{}", diet_core::normalize_url(url));
    }
    Ok(())
}

fn cmd_candidate_id(urls: &[String]) -> Result<(), String> {
    for url in urls {
        let normalized = diet_core::normalize_url(url);
        let id = diet_core::get_candidate_id_for_url(&normalized);
        println!("{}\t{}", normalized, id.as_deref().unwrap_or("-"));
    }
    Ok(())
}

fn cmd_check(store: &str, url: &str, text: Option<&str>) -> Result<(), String> {
    let parsed = Url::parse(url).map_err(|e| format!("Invalid URL '{}': {}", url, e))?;
    let store = open_store(store)?;
    let matcher = store.matcher();

    println!("URL:        {}", url);
    println!("Normalized: {}", diet_core::normalize_url(url));
    println!("  Paused:          {}", matcher.is_paused());
    println!("  Host has rules:  {}", matcher.is_blocking_enabled_for_host(&parsed));
    println!("  Host blocked:    {}", matcher.is_host_blocked(&parsed));
    println!("  URL blocked:     {}", matcher.is_url_blocked(&parsed));
    if let Some(text) = text {
        println!("  Item blocked:    {}", matcher.is_item_blocked(&parsed, Some(text)));
    }
    Ok(())
}

fn cmd_dedupe(input: &str, output: Option<&str>) -> Result<(), String> {
    let parsed = parse_block_rules(&read_file(input)?).map_err(|e| format!("Invalid rule list: {}", e))?;
    let mut rules = parsed.rules;
    let stats = dedupe_block_rules(&mut rules);

    let text = serde_json::to_string_pretty(&rules).map_err(|e| e.to_string())?;
    match output {
        Some(path) => {
            fs::write(path, text).map_err(|e| format!("Failed to write '{}': {}", path, e))?;
            eprintln!(
                "Rules: {} -> {} (dedupe removed {}, skipped {})",
                stats.before,
                stats.after,
                stats.deduped,
                parsed.skipped.len()
            );
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn cmd_add(store: &str, kind: AddKind, hostname: &str, value: Option<&str>) -> Result<(), String> {
    let value = || value.ok_or_else(|| "This kind of rule needs a value".to_string());
    let mut store = open_store(store)?;

    let rule = match kind {
        AddKind::Host => store.add_block_host_rule(hostname),
        AddKind::Link => store.add_block_link_rule(hostname, value()?),
        AddKind::Pathname => store.add_block_rule(BlockRule::pathname(hostname, value()?)),
        AddKind::Item => store.add_block_rule(BlockRule::item(hostname, value()?)),
        AddKind::Url => {
            let link = value()?;
            let rule = url_rule_for_link(hostname, link)
                .ok_or_else(|| format!("'{}' does not normalize to a URL", link))?;
            store.add_block_rule(rule)
        }
    }
    .map_err(|e| format!("Failed to add rule: {}", e))?;

    println!("{}\t{}", rule.id, rule);
    Ok(())
}

fn cmd_import(store: &str, input: &str) -> Result<(), String> {
    let parsed = parse_block_rules(&read_file(input)?).map_err(|e| format!("Invalid rule list: {}", e))?;
    let total = parsed.rules.len();
    let mut store = open_store(store)?;
    let added = store
        .add_block_rules(parsed.rules)
        .map_err(|e| format!("Failed to import rules: {}", e))?;

    println!("Imported '{}'", Path::new(input).display());
    println!("  Read:     {}", total);
    println!("  Added:    {}", added);
    println!("  Skipped:  {}", parsed.skipped.len());
    Ok(())
}

fn cmd_defaults(store: &str) -> Result<(), String> {
    let mut store = open_store(store)?;
    let added = store
        .add_block_rules(default_block_rules())
        .map_err(|e| format!("Failed to add default rules: {}", e))?;
    println!("Added {} default rules", added);
    Ok(())
}

fn cmd_remove(store: &str, id: &str) -> Result<(), String> {
    let mut store = open_store(store)?;
    let removed = store
        .remove_block_rule_by_id(id)
        .map_err(|e| format!("Failed to remove rule: {}", e))?;
    if !removed {
        return Err(format!("No rule with id '{}'", id));
    }
    println!("Removed {}", id);
    Ok(())
}

fn cmd_list(store: &str) -> Result<(), String> {
    let store = open_store(store)?;
    for rule in store.rules() {
        println!("{}\t{}\t{}", rule.id, rule.created_at, rule);
    }
    Ok(())
}

fn cmd_hosts(store: &str) -> Result<(), String> {
    let store = open_store(store)?;
    for hostname in store.get_hostnames() {
        println!("{}", hostname);
    }
    Ok(())
}

fn cmd_set_paused(store: &str, paused: bool) -> Result<(), String> {
    let mut store = open_store(store)?;
    let changed = store
        .set_paused(paused)
        .map_err(|e| format!("Failed to update settings: {}", e))?;
    let state = if paused { "paused" } else { "active" };
    if changed {
        println!("Blocking is now {}", state);
    } else {
        println!("Blocking was already {}", state);
    }
    Ok(())
}

fn cmd_stats(store: &str) -> Result<(), String> {
    let stats = StatsStore::open(FileStorage::new(store))
        .map_err(|e| format!("Failed to open store '{}': {}", store, e))?
        .stats();
    println!("Blocked links:  {}", stats.num_blocked_links_total);
    println!("Blocked items:  {}", stats.num_blocked_items_total);
    Ok(())
}

fn cmd_select(html: &str, url: &str, start: &str, trace: bool) -> Result<(), String> {
    let doc = HtmlDocument::parse(&read_file(html)?, url).map_err(|e| e.to_string())?;
    let start_el = doc
        .select_first(start)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("No element matches '{}'", start))?;

    let tree = doc.tree();
    let options = SelectorOptions::for_page(doc.url()).with_trace(trace);
    match get_best_link_block_candidate(&tree, &start_el, &options) {
        Some(candidate) => {
            let href = tree.href(&candidate.link).unwrap_or_default();
            println!("Element:  <{}>{}", tree.tag_name(&candidate.element), describe(&candidate.element));
            println!("Link:     {}", href);
            println!("Rule:     {}", diet_rules::pathname_rule_for_url(&options.hostname, &href));
        }
        None => println!("No candidate"),
    }
    Ok(())
}

fn describe(element: &scraper::ElementRef<'_>) -> String {
    match element.value().id() {
        Some(id) => format!(" #{}", id),
        None => String::new(),
    }
}

fn cmd_scan(store: &str, html: &str, url: &str, record: bool) -> Result<(), String> {
    let doc = HtmlDocument::parse(&read_file(html)?, url).map_err(|e| e.to_string())?;
    let rules = open_store(store)?;
    let matcher = rules.matcher();

    let tree = doc.tree();
    let report = scan_page(&tree, &tree.root(), doc.url(), &matcher);

    for link in &report.links {
        println!("link  <{}>{}\t{}", tree.tag_name(&link.container), describe(&link.container), link.href);
    }
    for item in &report.items {
        println!(
            "item  <{}>{}\t{}",
            tree.tag_name(&item.container),
            describe(&item.container),
            item.text.trim()
        );
    }
    println!(
        "Blocked {} links and {} items",
        report.num_blocked_links(),
        report.num_blocked_items()
    );

    if record {
        let mut stats = StatsStore::open(FileStorage::new(store))
            .map_err(|e| format!("Failed to open store '{}': {}", store, e))?;
        stats
            .record_scan(&report)
            .map_err(|e| format!("Failed to record stats: {}", e))?;
    }
    Ok(())
}
