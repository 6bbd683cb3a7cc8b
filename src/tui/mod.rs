mod app;
mod markdown;
mod palette;
mod ui;

pub use app::run;
