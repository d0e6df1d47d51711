use crate::{extractor::ScrapedContent, personas::Persona};

/// Appended to every user prompt so output has the same shape in any voice.
pub const STRUCTURE_GUIDELINES: &str = "\
Format your response for easy reading:
- Organize it into 3-5 clearly separated sections.
- Give each section a short, descriptive subheading.
- Keep paragraphs short: two to four sentences each.
- Use bulleted or numbered lists where they make the content clearer.
- Stay in character for the whole response, but keep the facts accurate.";

pub fn webpage_prompt(persona: &Persona, content: &ScrapedContent) -> String {
    format!(
        "Rewrite the following web page in the voice of {name}.\n\n\
         Title: {title}\n\
         URL: {url}\n\
         Word count: {words}\n\n\
         Content:\n{body}\n\n\
         {guidelines}",
        name = persona.name,
        title = content.title,
        url = content.url,
        words = content.metadata.word_count,
        body = content.content,
        guidelines = STRUCTURE_GUIDELINES,
    )
}

pub fn text_prompt(persona: &Persona, text: &str) -> String {
    format!(
        "Rewrite the following text in the voice of {name}.\n\n\
         Text:\n{text}\n\n\
         {guidelines}",
        name = persona.name,
        text = text,
        guidelines = STRUCTURE_GUIDELINES,
    )
}
