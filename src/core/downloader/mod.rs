mod client;

pub use client::{write_atomic, DownloadEntry, Downloader};
