// Prompts for the radio script stage. Book blocks are rendered by
// `book::prompt`; this file only holds the framing around them.

/// System prompt for the script writer.
pub const RADIO_SCRIPT_SYSTEM: &str = "You are the host of a short Japanese radio programme \
    that introduces newly published books. \
    Write natural spoken Japanese for a single narrator. \
    Respond with the script text only: no headings, no stage directions, no markdown.";

/// User prompt template. `{date}` and `{books}` are substituted before sending.
pub const RADIO_SCRIPT_PROMPT: &str = "Today is {date}. \
    Introduce the following books published today, in the order given. \
    For each book mention its title and give a one or two sentence summary \
    drawn only from the information provided. \
    Open with a short greeting and close with a short sign-off.\n\n{books}";

pub fn radio_script_prompt(date: &str, books: &str) -> String {
    RADIO_SCRIPT_PROMPT
        .replace("{date}", date)
        .replace("{books}", books)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radio_script_prompt_substitutes_both_slots() {
        let prompt = radio_script_prompt("2025-02-11", "[1]\ntitle:A\n");
        assert!(prompt.starts_with("Today is 2025-02-11."));
        assert!(prompt.ends_with("[1]\ntitle:A\n"));
        assert!(!prompt.contains("{date}"));
    }
}
