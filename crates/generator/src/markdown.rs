/// Pull the slide markdown out of a model response.
///
/// Returns the lines strictly between the first and last lines that start
/// with a triple-backtick fence. With fewer than two fences the whole
/// response is taken as-is.
pub fn extract_markdown(response: &str) -> String {
    let lines: Vec<&str> = response.lines().collect();
    let fences: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.starts_with("```"))
        .map(|(i, _)| i)
        .collect();

    match (fences.first(), fences.last()) {
        (Some(&first), Some(&last)) if last > first => lines[first + 1..last].join("\n"),
        _ => response.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_outer_fence() {
        let text = "Here you go:\n```md\n---\nmarp: true\n---\n# Hi\n```\nThanks";
        assert_eq!(extract_markdown(text), "---\nmarp: true\n---\n# Hi");
    }

    #[test]
    fn keeps_inner_code_blocks() {
        let text = "```md\n# Code\n```python\nprint(1)\n```\n```";
        assert_eq!(extract_markdown(text), "# Code\n```python\nprint(1)\n```");
    }

    #[test]
    fn handles_crlf() {
        let text = "```md\r\n# A\r\n```";
        assert_eq!(extract_markdown(text), "# A");
    }

    #[test]
    fn unfenced_text_is_returned_whole() {
        assert_eq!(extract_markdown("# Just markdown"), "# Just markdown");
        assert_eq!(extract_markdown(""), "");
    }

    #[test]
    fn single_fence_is_returned_whole() {
        assert_eq!(extract_markdown("```md\n# A"), "```md\n# A");
    }
}
