//! Deploy orchestrator for the news artifact: run the external scraper
//! under a deadline, then commit and push `news.json` to the site
//! repository, tolerating failure at every step.

pub mod git;
pub mod pipeline;
pub mod regen;
pub mod run_log;
pub mod scrape;
