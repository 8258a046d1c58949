use crate::types::GenerationRequest;

const PAGE_REQUIREMENTS: [&str; 7] = [
    "Have a professional design with CSS included in a <style> tag.",
    "Include a proper heading structure (h1, h2, etc.).",
    "Provide comprehensive information on the topic.",
    "Include visual structure with sections, lists, or tables as appropriate.",
    "Be factually accurate and educational.",
    "Format code examples properly if relevant.",
    "Include a \"Related Topics\" section at the bottom with at least 3-5 related topic links.",
];

const DARK_MODE_NOTE: &str = "Note: The webpage must be designed for dark mode. Use a dark color palette and design elements that align with a dark interface.";

const IMAGES_NOTE: &str = "Note: Include illustrative images where they help, but make every image self-contained: use inline <svg> elements or data: URIs. Never reference external image URLs.";

/// Build the page-generation prompt for a request.
pub fn build_prompt(request: &GenerationRequest) -> String {
    let mut prompt = format!(
        "You are a helpful AI assistant that generates entire web pages in response to search queries.\n\
         Generate a complete webpage (using HTML) that thoroughly answers the query: \"{}\"\n\n\
         Your response should:\n{}\n",
        request.query(),
        numbered_list(&PAGE_REQUIREMENTS)
    );

    if request.dark_mode() {
        prompt.push('\n');
        prompt.push_str(DARK_MODE_NOTE);
    }
    if request.want_images() {
        prompt.push('\n');
        prompt.push_str(IMAGES_NOTE);
    }

    prompt
}

/// Create a numbered list from items (1-indexed).
pub fn numbered_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}
