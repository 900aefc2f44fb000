mod api;
mod commands;
mod host;
mod http_pipeline;
