use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use tickerfeed::api::{
    ApiClient, HighlightsFeed, NewsChannel, NewsFeed, TickerFeed, TickerList, VideoChannel,
    VideoFeed,
};
use tickerfeed::config::Config;
use tickerfeed::context::SessionContext;
use tickerfeed::feed::{FeedAggregator, FeedNotice};
use tickerfeed::home::{load_home, load_merged, HomeLayout};
use tickerfeed::model::{MentionTicker, NewsArticle};
use tickerfeed::port::PageRequest;
use tickerfeed::projection::{filter_news, news_rows, rank_tickers, NewsFilter, TickerSort};
use tickerfeed::util::{sanitize_title, truncate_to_width};

const FALLBACK_WIDTH: usize = 100;

#[derive(Parser, Debug)]
#[command(
    name = "tickerfeed",
    version,
    about = "Crypto news, ticker mentions and videos in the terminal"
)]
struct Args {
    /// Config file (default: ~/.config/tickerfeed/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List news articles
    News {
        /// general, ranked, topic:<t>, search:<q> or ticker:<sym>[@<date>]
        #[arg(long, default_value = "general")]
        channel: NewsChannel,
        /// all, positive, negative, neutral or topic:<name>
        #[arg(long, default_value = "all")]
        sentiment: NewsFilter,
        /// Pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
        /// Bypass caches and reload from page 1
        #[arg(long)]
        refresh: bool,
    },
    /// Rank tickers by mentions or sentiment
    Tickers {
        /// top, positive or negative
        #[arg(long, default_value = "top")]
        sort: TickerSort,
        /// Tickers to show
        #[arg(long, default_value_t = 20)]
        count: usize,
        /// Most pages to load while collecting tickers
        #[arg(long, default_value_t = 5)]
        pages: u32,
    },
    /// Headlines, news, top mentions and videos
    Home {
        #[arg(long)]
        refresh: bool,
    },
    /// News for a set of watched tickers, merged
    Watch {
        /// Comma-separated ticker symbols
        #[arg(value_delimiter = ',', required = true)]
        tickers: Vec<String>,
        /// Articles to show
        #[arg(long, default_value_t = 20)]
        count: usize,
    },
}

fn terminal_width() -> usize {
    crossterm::terminal::size()
        .map(|(cols, _)| cols as usize)
        .unwrap_or(FALLBACK_WIDTH)
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let config = match path.or_else(Config::default_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    Ok(config.with_env_overrides())
}

fn print_notices<K: std::fmt::Display>(rx: &mut mpsc::Receiver<FeedNotice<K>>) {
    while let Ok(notice) = rx.try_recv() {
        eprintln!("warning: {} ({:?}): {}", notice.key, notice.kind, notice.message);
    }
}

fn article_line(article: &NewsArticle, width: usize) -> String {
    let date = article
        .published
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "----------".to_string());
    let sentiment = article.sentiment.map_or("-", |s| s.as_str());
    let prefix = format!("{date}  {sentiment:<8}  ");
    let title = sanitize_title(&article.title);
    let room = width.saturating_sub(prefix.len());
    format!("{prefix}{}", truncate_to_width(&title, room))
}

fn ticker_line(rank: usize, ticker: &MentionTicker, width: usize) -> String {
    let line = format!(
        "{rank:>3}. {:<8} {:>+6.2}  {:>6} mentions  (+{} / ={} / -{})  {}",
        ticker.ticker,
        ticker.sentiment_score,
        ticker.total_mentions,
        ticker.positive_mentions,
        ticker.neutral_mentions,
        ticker.negative_mentions,
        sanitize_title(&ticker.name),
    );
    truncate_to_width(&line, width).into_owned()
}

async fn run_news(
    client: Arc<ApiClient>,
    config: &Config,
    channel: NewsChannel,
    filter: NewsFilter,
    pages: u32,
    refresh: bool,
) -> Result<()> {
    let (notice_tx, mut notice_rx) = mpsc::channel(16);
    let aggregator =
        FeedAggregator::with_options(NewsFeed::new(client), config.page_limit, Some(notice_tx));

    let mut snapshot = if refresh {
        aggregator.refresh(&channel).await
    } else {
        aggregator.load_initial(&channel).await
    };
    for _ in 1..pages.max(1) {
        if snapshot.cursor.is_end() || snapshot.error().is_some() {
            break;
        }
        snapshot = aggregator.load_next(&channel).await;
    }
    print_notices(&mut notice_rx);

    if snapshot.items.is_empty() {
        if let Some(error) = snapshot.error() {
            anyhow::bail!("Failed to load {channel} news: {error}");
        }
    }

    let filtered = filter_news(&snapshot.items, &filter);
    let width = terminal_width();
    for row in news_rows(&filtered) {
        if row.is_first {
            println!("{} / {}", channel, filter.label());
        }
        println!("{}", article_line(row.article, width));
        if row.is_last {
            println!(
                "{} of {} articles, {}",
                filtered.len(),
                snapshot.items.len(),
                snapshot.cursor
            );
        }
    }
    if filtered.is_empty() {
        println!("No articles.");
    }
    Ok(())
}

async fn run_tickers(
    client: Arc<ApiClient>,
    config: &Config,
    sort: TickerSort,
    count: usize,
    pages: u32,
) -> Result<()> {
    let (notice_tx, mut notice_rx) = mpsc::channel(16);
    let aggregator =
        FeedAggregator::with_options(TickerFeed::new(client), config.page_limit, Some(notice_tx));
    let key = TickerList::TopMentions;

    let snapshot = aggregator.load_until(&key, count, pages.max(1)).await;
    print_notices(&mut notice_rx);

    if let (true, Some(error)) = (snapshot.items.is_empty(), snapshot.error()) {
        anyhow::bail!("Failed to load tickers: {error}");
    }

    let width = terminal_width();
    println!("{}", sort.label());
    for (idx, ticker) in rank_tickers(&snapshot.items, sort)
        .into_iter()
        .take(count)
        .enumerate()
    {
        println!("{}", ticker_line(idx + 1, ticker, width));
    }
    Ok(())
}

async fn run_home(client: Arc<ApiClient>, config: &Config, refresh: bool) -> Result<()> {
    let news = NewsFeed::new(Arc::clone(&client));
    let videos = VideoFeed::new(Arc::clone(&client));
    let highlights = HighlightsFeed::new(client);

    let home = load_home(
        &news,
        &NewsChannel::General,
        &videos,
        &VideoChannel::All,
        &highlights,
        HomeLayout::from_config(config),
        refresh,
    )
    .await;

    for failure in &home.failures {
        eprintln!("warning: {failure}");
    }

    let width = terminal_width();
    if !home.headlines.is_empty() {
        println!("Headlines");
        for article in &home.headlines {
            println!("{}", article_line(article, width));
        }
        println!();
    }
    println!("Latest News");
    for article in &home.news {
        println!("{}", article_line(article, width));
    }
    if !home.top_mentions.is_empty() {
        println!();
        println!("Top Mentions");
        for (idx, ticker) in home.top_mentions.iter().enumerate() {
            println!("{}", ticker_line(idx + 1, ticker, width));
        }
    }
    if !home.videos.is_empty() {
        println!();
        println!("Videos");
        for video in &home.videos {
            let title = sanitize_title(&video.title);
            println!("  {}", truncate_to_width(&title, width.saturating_sub(2)));
        }
    }
    Ok(())
}

async fn run_watch(
    client: Arc<ApiClient>,
    config: &Config,
    tickers: Vec<String>,
    count: usize,
) -> Result<()> {
    let context = SessionContext::default().with_watching(tickers);
    let news = NewsFeed::new(client);

    let (mut articles, failures) = load_merged(
        &news,
        context.news_channels(),
        PageRequest::new(1, config.page_limit),
    )
    .await;
    for (channel, error) in &failures {
        eprintln!("warning: {channel}: {error}");
    }
    if articles.is_empty() && !failures.is_empty() {
        anyhow::bail!("Failed to load news for {}", context.watching().join(", "));
    }

    articles.sort_by(|a, b| b.published.cmp(&a.published));
    let width = terminal_width();
    println!("Watching {}", context.watching().join(", "));
    for article in articles.iter().take(count) {
        println!("{}", article_line(article, width));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(args.config)?;
    let client = Arc::new(ApiClient::from_config(&config).context("Failed to create API client")?);

    match args.command {
        Command::News {
            channel,
            sentiment,
            pages,
            refresh,
        } => run_news(client, &config, channel, sentiment, pages, refresh).await,
        Command::Tickers { sort, count, pages } => {
            run_tickers(client, &config, sort, count, pages).await
        }
        Command::Home { refresh } => run_home(client, &config, refresh).await,
        Command::Watch { tickers, count } => run_watch(client, &config, tickers, count).await,
    }
}
