use anyhow::Result;
use clap::ValueEnum;
use flashcore::models::{Card, Review};
use flashcore::repo::DatabaseStats;
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// Bundled output configuration passed to all print functions
#[derive(Debug, Clone, Copy)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Prints a list of cards in the specified format
pub fn print_cards(cards: &[Card], config: &OutputConfig) -> Result<()> {
    match config.format {
        OutputFormat::Human => {
            if cards.is_empty() {
                println!("No cards found.");
                return Ok(());
            }
            println!("{:<36}  {:<10}  {:<10}  {:<20}  FRONT", "UUID", "STATE", "DUE", "DECK");
            for card in cards {
                println!(
                    "{:<36}  {:<10}  {:<10}  {:<20}  {}",
                    card.get_uuid().to_string(),
                    card.get_state().as_str(),
                    or_dash(card.get_next_due_date()),
                    card.get_deck_name(),
                    card.get_front().lines().next().unwrap_or_default()
                );
            }
            Ok(())
        }
        OutputFormat::Json => print_json(cards),
    }
}

/// Prints a single card in the specified format
pub fn print_card(card: &Card, config: &OutputConfig) -> Result<()> {
    match config.format {
        OutputFormat::Human => {
            println!("UUID:       {}", card.get_uuid());
            println!("Deck:       {}", card.get_deck_name());
            println!("Front:      {}", card.get_front());
            println!("Back:       {}", card.get_back());
            let tags: Vec<&str> = card.get_tags().iter().map(String::as_str).collect();
            println!("Tags:       {}", tags.join(", "));
            println!("State:      {}", card.get_state());
            println!("Due:        {}", or_dash(card.get_next_due_date()));
            println!("Stability:  {}", or_dash(card.get_stability().map(|s| format!("{:.2}", s))));
            println!("Difficulty: {}", or_dash(card.get_difficulty().map(|d| format!("{:.2}", d))));
            println!("Added:      {}", card.get_added_at());
            println!("Modified:   {}", card.get_modified_at());
            Ok(())
        }
        OutputFormat::Json => print_json(card),
    }
}

/// Prints a list of reviews in the specified format
pub fn print_reviews(reviews: &[Review], config: &OutputConfig) -> Result<()> {
    match config.format {
        OutputFormat::Human => {
            if reviews.is_empty() {
                println!("No reviews found.");
                return Ok(());
            }
            println!(
                "{:<6}  {:<25}  {:<6}  {:<8}  {:<10}  {:>9}  {:>10}",
                "ID", "TIMESTAMP", "RATING", "TYPE", "NEXT DUE", "STABILITY", "DIFFICULTY"
            );
            for review in reviews {
                println!(
                    "{:<6}  {:<25}  {:<6}  {:<8}  {:<10}  {:>9.2}  {:>10.2}",
                    or_dash(review.get_review_id()),
                    review.get_ts().to_rfc3339(),
                    review.get_rating(),
                    review.get_review_type().as_str(),
                    review.get_next_due().to_string(),
                    review.get_stab_after(),
                    review.get_diff()
                );
            }
            Ok(())
        }
        OutputFormat::Json => print_json(reviews),
    }
}

/// Prints store statistics in the specified format
pub fn print_stats(stats: &DatabaseStats, config: &OutputConfig) -> Result<()> {
    match config.format {
        OutputFormat::Human => {
            println!("Cards:   {}", stats.total_cards);
            println!("Reviews: {}", stats.total_reviews);
            if !stats.states.is_empty() {
                println!();
                for (state, count) in &stats.states {
                    println!("  {:<12} {}", state, count);
                }
            }
            if !stats.decks.is_empty() {
                println!();
                println!("{:<30}  {:>6}  {:>6}", "DECK", "CARDS", "DUE");
                for deck in &stats.decks {
                    println!("{:<30}  {:>6}  {:>6}", deck.deck_name, deck.card_count, deck.due_count);
                }
            }
            Ok(())
        }
        OutputFormat::Json => print_json(stats),
    }
}

/// Prints a single count
pub fn print_count(label: &str, count: i64, config: &OutputConfig) -> Result<()> {
    match config.format {
        OutputFormat::Human => {
            println!("{}", count);
            Ok(())
        }
        OutputFormat::Json => {
            let mut body = serde_json::Map::new();
            body.insert(label.to_string(), count.into());
            print_json(&body)
        }
    }
}

/// Prints a status message
pub fn print_message(message: &str, config: &OutputConfig) -> Result<()> {
    match config.format {
        OutputFormat::Human => {
            println!("{}", message);
            Ok(())
        }
        OutputFormat::Json => print_json(&serde_json::json!({ "message": message })),
    }
}
