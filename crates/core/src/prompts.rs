//! Generation instruction builder.
//!
//! The instruction is a pure function of `(theme, settings)`: a worked
//! example deck in the chosen theme's dialect, optional detail-level and
//! audience paragraphs, and a fixed set of formatting rules.

use std::fmt::Write;

use crate::settings::{Audience, DetailLevel, SlideSettings, Theme};

/// Per-theme knobs for the worked example.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeProfile {
    pub lead_class: bool,
    pub invert_class: bool,
    pub tinytext_class: bool,
    pub title_class: bool,
    pub header_location: &'static str,
    pub footer_location: &'static str,
    pub description: &'static str,
}

const LIGHT_BY_DEFAULT: &str = "By default, the color scheme for each slide is light.";
const TOP_LEFT: &str = "(top left of the slide)";
const BOTTOM_LEFT: &str = "(bottom left of the slide)";

impl ThemeProfile {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Default | Theme::Gaia => Self {
                lead_class: true,
                invert_class: true,
                tinytext_class: false,
                title_class: false,
                header_location: TOP_LEFT,
                footer_location: BOTTOM_LEFT,
                description: LIGHT_BY_DEFAULT,
            },
            Theme::Beam => Self {
                lead_class: false,
                invert_class: false,
                tinytext_class: true,
                title_class: true,
                header_location: "(bottom left half of the slide)",
                footer_location: "(bottom right half of the slide)",
                description: "IMPORTANT: You must use the above title class tag at the top of the title slide (<!-- _class: title -->).\n- Beam is a light color scheme based on the LaTeX Beamer theme.",
            },
            Theme::RosePine => Self {
                lead_class: true,
                invert_class: false,
                tinytext_class: false,
                title_class: false,
                header_location: TOP_LEFT,
                footer_location: BOTTOM_LEFT,
                description: "Rose Pine is a dark color scheme.",
            },
            Theme::Uncover => Self {
                lead_class: true,
                invert_class: true,
                tinytext_class: false,
                title_class: false,
                header_location: "(top middle of the slide)",
                footer_location: "(bottom middle of the slide)",
                description: LIGHT_BY_DEFAULT,
            },
            Theme::GraphPaper => Self {
                lead_class: true,
                invert_class: false,
                tinytext_class: true,
                title_class: false,
                header_location: TOP_LEFT,
                footer_location: BOTTOM_LEFT,
                description: "Graph Paper is a light color scheme.",
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Instruction text
// ---------------------------------------------------------------------------

const PREAMBLE: &str = "You are an expert at creating Marp markdown presentations. You are highly skilled at extracting content from documents and creating beautiful, well-designed presentations.

Create a Marp markdown presentation using the following instructions:

The following is an example of how to create a Marp markdown presentation. All of the frontmatter in the example is also required for your response, other than the header and footer.";

const GUIDELINES: &str = "IMPORTANT GUIDELINES:
1. Always begin with a short title slide with a title, a short description, and author name (only if provided). The title should be an H1 header, the description should be a regular text, and the author name should be a regular text.
2. Ensure that the content on each slide fits inside the slide. Never create paragraphs.
3. Always use bullet points and other formatting options to make the content more readable.
4. Prefer multi-line code blocks over inline code blocks for any code longer than a few words. Even if the code is a single line, use a multi-line code block.
5. Do not end with --- (three dashes) on a new line, since this will end the presentation with an empty slide.

Make the slides look as beautiful and well-designed as possible. Use all of the formatting options available to you.

Enclose your response in triple backticks like this:

```md
<your response here>
```";

const INVERT_SECTION: &str = "
---

<!-- _class: invert -->

## Inverted color scheme

- You can use the <!-- _class: invert --> tag at the top of a slide to create a dark mode slide.
- Use this when you want to have a slide with a different color scheme than the rest of the presentation.
- Do this when a slide should stand out.
";

const TINYTEXT_SECTION: &str = "
---

<!-- _class: tinytext -->

# Tinytext class

- You can use the <!-- _class: tinytext --> tag at the top of a slide to make some text tiny.
- This might be useful for References.
";

const EXAMPLE_TAIL: &str = "
---

## Code blocks

### Multi-line code blocks

```python
print(\"This is a code block\")
print(\"You can use triple backticks to create a code block\")
print(\"You can also use the language name to highlight the code block\")
```

- **Another example:**

```c
printf(\"This is another code block\");
printf(\"Always specify the language name for code blocks\");
```

---

### Inline code blocks

- `this` is an inline code block
- You can use it using single backticks like this: `this`

---

## Creating new slides

- To create a new slide, use a new line with three dashes like this:

```
---

# New slide
```

---

# Conclusion

- You can use Markdown formatting to create **bold**, *italic*, and ~~strikethrough~~ text.
> This is a block quote
This is regular text";

pub fn detail_instruction(level: DetailLevel) -> &'static str {
    match level {
        DetailLevel::Detailed => "Extract comprehensive content from the document, preserving all key information and supporting details. Include all major sections and subsections from the source material, maintaining the depth of explanations, examples, data points, and contextual information. Create sufficient slides to accommodate all relevant content without crowding. For each topic in the source document, extract both main points and their supporting evidence or explanations. Ensure visual balance by limiting each slide to 6-8 bullet points or a comparable amount of content. Do not overflow individual slides with too much information or they will go off the slide.",
        DetailLevel::Medium => "Extract the most significant information from each section of the document, focusing on main concepts and key supporting details. Select content that represents the core message and essential evidence without including every example or minor point from the source material. Consolidate related information into coherent slides, aiming for comprehensive coverage of major topics while omitting supplementary details. Prioritize information that directly supports the document's main arguments or conclusions. Limit each slide to 4-6 bullet points or a comparable amount of content.",
        DetailLevel::Minimal => "Extract only the most essential information from the document, focusing exclusively on key conclusions, main arguments, and critical data points. Select content that communicates the core message in the most concise form possible. Consolidate major sections of the document into a limited number of focused slides. Omit supporting details, examples, and explanations unless absolutely necessary for basic comprehension. Prioritize high-level takeaways over process explanations or contextual information. Limit each slide to 3-4 bullet points or a comparable amount of content.",
    }
}

pub fn audience_instruction(audience: Audience) -> &'static str {
    match audience {
        Audience::General => "Format the presentation for a general audience with varying levels of background knowledge. Select the clearest and most accessible language from the document. When technical terms appear in the source, include brief definitions from the document when available. Prioritize content from the document that explains broader context and significance. Organize the extracted information as a narrative when possible, with a clear beginning, middle, and end. Format slides with minimal text and emphasize any visual elements from the original document.",
        Audience::Academic => "Format the presentation for an academic audience. Select terminology and detailed explanations from the document that preserve methodological details and theoretical frameworks. When extracting content, maintain the document's original citations, methodologies, and nuanced points. Preserve the logical structure of arguments found in the source material. When organizing information from the document, maintain appropriate context for all extracted data and findings. Format slides to balance detailed information with clarity.",
        Audience::Technical => "Format the presentation for a technical audience. Preserve technical terminology, specifications, and detailed explanations from the document. Prioritize content that focuses on implementation details, methodologies, and technical processes described in the source material. When extracting diagrams or code examples from the document, include the relevant explanatory text. Maintain the technical depth and precision of the source material. Organize the content in a logical sequence that preserves technical relationships and dependencies described in the document.",
        Audience::Professional => "Format the presentation for business professionals. Select terminology and concepts from the document that highlight practical applications and business relevance. Prioritize content from the document that demonstrates actionable insights, case studies, and results. Organize the extracted information with an emphasis on takeaways and strategic implications. Format slide content with concise bullet points rather than dense paragraphs. When selecting information from charts or data in the document, focus on metrics and trends most relevant to business decisions.",
        Audience::Executive => "Format the presentation for executive decision-makers. Select high-level information from the document that focuses on strategic implications and business impact. Prioritize content related to outcomes, ROI, and competitive advantages mentioned in the source material. Extract summary information rather than operational details unless specifically relevant to executive decisions. When selecting information from the document, focus on big-picture insights and key recommendations. Format slides with concise headline statements that capture the essential points from the document.",
    }
}

/// Worked example deck in the theme's dialect, fenced as markdown.
pub fn theme_example(theme: Theme) -> String {
    let profile = ThemeProfile::for_theme(theme);
    let mut out = String::from("```md\n---\nmarp: true\n");
    let _ = writeln!(out, "theme: {theme}");
    if profile.lead_class {
        out.push_str("_class: lead\n");
    }
    out.push_str("paginate: true\n");
    let _ = writeln!(out, "header: This is an optional header {}", profile.header_location);
    let _ = writeln!(out, "footer: This is an optional footer {}", profile.footer_location);
    out.push_str("---\n");
    if profile.title_class {
        out.push_str("\n<!-- _class: title -->\n");
    }
    out.push_str("\n# Title\n\n## Heading 2\n\n");
    let _ = writeln!(out, "- {}", profile.description);
    if profile.invert_class {
        out.push_str(INVERT_SECTION);
    }
    if profile.tinytext_class {
        out.push_str(TINYTEXT_SECTION);
    }
    out.push_str(EXAMPLE_TAIL);
    out.push_str("\n```");
    out
}

/// Build the full generation instruction.
pub fn build_prompt(theme: Theme, settings: &SlideSettings) -> String {
    let detail = settings.slide_detail.map(detail_instruction).unwrap_or("");
    let audience = settings.audience.map(audience_instruction).unwrap_or("");

    let mut out = String::with_capacity(8 * 1024);
    out.push_str(PREAMBLE);
    out.push_str("\n\n");
    out.push_str(&theme_example(theme));
    let _ = write!(out, "\n\nTheme: {theme}\n\n{detail}\n\n{audience}\n\n");
    out.push_str(GUIDELINES);
    out
}
