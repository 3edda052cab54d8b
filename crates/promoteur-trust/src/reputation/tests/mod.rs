mod cases;
mod common;
mod config;
mod jobs;
mod leads;
mod trust;
