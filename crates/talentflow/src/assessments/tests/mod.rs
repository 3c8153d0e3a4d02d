mod builder;
mod common;
mod routing;
