// Job records: one per distinct posting URL, scraped once and shared by every
// application that references it.

pub mod lifecycle;
