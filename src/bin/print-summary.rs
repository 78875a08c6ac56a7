use sitegraph::{print_summary, CrawlRecord};

/// Replays an existing record log through the summary printer.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "records.jsonl".to_string());

    let mut records: Vec<CrawlRecord> = Vec::new();
    for line in std::fs::read_to_string(&path)?.lines() {
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(line)?);
    }

    print_summary(&records);
    Ok(())
}
