mod e2e;
mod metadata;
