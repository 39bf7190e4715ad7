//! Cross-module tests for the build and ask pipelines.
