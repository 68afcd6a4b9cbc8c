/// Stats from a tracker run.
#[derive(Debug, Default)]
pub struct TrackerStats {
    pub products_collected: u32,
    pub product_errors: u32,
    pub reviews_collected: u32,
    pub review_errors: u32,
    pub polls: u32,
    pub wait_secs: u32,
    pub batches: u32,
    pub ai_analyzed: u32,
    pub fallback_analyzed: u32,
    pub positive: u32,
    pub neutral: u32,
    pub negative: u32,
    pub unknown: u32,
    pub products_with_history: u32,
    pub price_drops: u32,
    pub price_increases: u32,
}

impl TrackerStats {
    pub fn coverage_pct(&self) -> f64 {
        let total = self.ai_analyzed + self.fallback_analyzed;
        if total == 0 {
            return 0.0;
        }
        self.ai_analyzed as f64 / total as f64 * 100.0
    }
}

impl std::fmt::Display for TrackerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Tracker Run Complete ===")?;
        writeln!(f, "Products collected: {}", self.products_collected)?;
        writeln!(f, "Product errors:     {}", self.product_errors)?;
        writeln!(f, "Reviews collected:  {}", self.reviews_collected)?;
        writeln!(f, "Review errors:      {}", self.review_errors)?;
        writeln!(f, "Snapshot polls:     {}", self.polls)?;
        writeln!(f, "Total wait:         {}s", self.wait_secs)?;
        writeln!(f, "AI batches:         {}", self.batches)?;
        writeln!(f, "AI analyzed:        {}", self.ai_analyzed)?;
        writeln!(f, "Fallback analyzed:  {}", self.fallback_analyzed)?;
        writeln!(f, "AI coverage:        {:.0}%", self.coverage_pct())?;
        writeln!(f, "\nSentiment:")?;
        writeln!(f, "  Positive: {}", self.positive)?;
        writeln!(f, "  Neutral:  {}", self.neutral)?;
        writeln!(f, "  Negative: {}", self.negative)?;
        writeln!(f, "  Unknown:  {}", self.unknown)?;
        writeln!(f, "\nPricing:")?;
        writeln!(f, "  With history: {}", self.products_with_history)?;
        writeln!(f, "  Drops:        {}", self.price_drops)?;
        writeln!(f, "  Increases:    {}", self.price_increases)?;
        Ok(())
    }
}
