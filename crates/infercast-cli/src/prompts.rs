//! Prompt sources and the movie prompt templates.

use anyhow::{Context, Result};
use rand::Rng;
use std::path::Path;

/// Titles used when no titles file is given.
pub const MOVIE_TITLES: &[&str] = &[
    "Forrest Gump",
    "The Shawshank Redemption",
    "The Godfather",
    "The Dark Knight",
    "Titanic",
    "Pulp Fiction",
    "Gladiator",
    "The Matrix",
    "Fight Club",
    "Inception",
    "Avatar",
    "The Lord of the Rings: The Return of the King",
    "Star Wars: Episode IV - A New Hope",
    "Jurassic Park",
    "The Lion King",
    "Toy Story",
    "Harry Potter and the Sorcerer's Stone",
    "Frozen",
    "Shrek",
    "Spider-Man",
];

pub fn default_titles() -> Vec<String> {
    MOVIE_TITLES.iter().map(|t| t.to_string()).collect()
}

pub fn synopsis_prompt(title: &str) -> String {
    format!(
        "\n    Please provide a short synopsis of the plot of the movie \"{title}.\" \
         Keep it concise and focused on the main storyline.\n\n    \
         Response: The synopsis of \"{title}\" is:\n    "
    )
}

/// Prompt asking for a JSON object describing `title`.
///
/// The title must be the first double-quoted string in the prompt; results
/// are keyed by it (see [`crate::repair::extract_title`]). `seed` only
/// varies the prompt text so repeated requests are not answered from a cache.
pub fn details_prompt(title: &str, seed: u8) -> String {
    format!(
        "\n    Random Seed: {seed}\n    \n    \
         Please provide details of the movie \"{title}\" in the form of a JSON object with the following keys:\n    \
         - \"title\": Title of the movie\n    \
         - \"release_year\": Year the movie was released\n    \
         - \"director\": Name of the director\n    \
         - \"genre\": Genre of the movie\n    \
         - \"main_actors\": List of main actors\n\n    \
         Response: The details of \"{title}\" are:\n    "
    )
}

pub fn synopsis_prompts(titles: &[String]) -> Vec<String> {
    titles.iter().map(|t| synopsis_prompt(t)).collect()
}

/// One details prompt per title, each with a fresh seed in `0..=255`.
pub fn details_prompts<R: Rng + ?Sized>(titles: &[String], rng: &mut R) -> Vec<String> {
    titles
        .iter()
        .map(|t| details_prompt(t, rng.random()))
        .collect()
}

/// Parses a prompt file: a JSON array of strings, or one prompt per line.
pub fn parse_prompts(contents: &str) -> Result<Vec<String>> {
    if contents.trim_start().starts_with('[') {
        return serde_json::from_str(contents).context("Prompt file is not a JSON array of strings");
    }
    Ok(non_empty_lines(contents))
}

pub fn read_prompts(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read prompts {}", path.display()))?;
    parse_prompts(&contents)
}

/// Reads a titles file, one title per line.
pub fn read_titles(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read titles {}", path.display()))?;
    Ok(non_empty_lines(&contents))
}

fn non_empty_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
