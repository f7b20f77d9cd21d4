//! Regex utilities for vcxwatch
//! Extracted to a separate crate for compilation optimization

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Compiled patterns for MSBuild project descriptors (`.vcxproj`, `.vcxproj.filters`)
pub mod descriptor {
    use super::*;

    /// `<ClCompile Include="..."` / `<ClInclude Include='...'`, optionally namespaced.
    pub static ITEM_PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(concat!(
            r"<\s*(?:[A-Za-z_][\w.-]*:)?(ClCompile|ClInclude)\b",
            r#"[^>]*?\bInclude\s*=\s*(?:"([^"]*)"|'([^']*)')"#,
        ))
        .expect("Invalid regex pattern")
    });

    pub static PROJECT_OPEN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"<\s*(?:[A-Za-z_][\w.-]*:)?Project\b").expect("Invalid regex pattern")
    });

    pub static PROJECT_CLOSE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"<\s*/\s*(?:[A-Za-z_][\w.-]*:)?Project\s*>").expect("Invalid regex pattern")
    });

    /// Kind of item an `Include` attribute was found on
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ItemKind {
        Compile,
        Include,
    }

    /// A raw `Include` value, entity-decoded but not yet resolved to a path
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Item {
        pub kind: ItemKind,
        pub include: String,
    }

    /// True when the text has both an opening and a closing `Project` element.
    ///
    /// A descriptor that is being rewritten by the generator is often observed
    /// half-written; such text fails this check.
    pub fn is_complete_project(text: &str) -> bool {
        match PROJECT_OPEN.find(text) {
            Some(open) => PROJECT_CLOSE.find_at(text, open.end()).is_some(),
            None => false,
        }
    }

    /// Extract all `ClCompile` / `ClInclude` items in document order
    /// Items inside `<!-- -->` comments are skipped.
    pub fn extract_items(text: &str) -> Vec<Item> {
        let text = super::xml::strip_comments(text);
        ITEM_PATTERN
            .captures_iter(&text)
            .filter_map(|caps| {
                let kind = match caps.get(1)?.as_str() {
                    "ClCompile" => ItemKind::Compile,
                    _ => ItemKind::Include,
                };
                let raw = caps.get(2).or_else(|| caps.get(3))?.as_str().trim();
                if raw.is_empty() {
                    return None;
                }
                Some(Item { kind, include: super::xml::decode_entities(raw) })
            })
            .collect()
    }
}

/// Minimal XML text helpers
pub mod xml {
    use super::*;

    pub static ENTITY_PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"&(?:(amp|lt|gt|quot|apos)|#([0-9]+)|#[xX]([0-9A-Fa-f]+));")
            .expect("Invalid regex pattern")
    });

    pub static COMMENT_PATTERN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("Invalid regex pattern"));

    /// Remove comment spans so markup inside them is not seen
    pub fn strip_comments(text: &str) -> Cow<'_, str> {
        if !text.contains("<!--") {
            return Cow::Borrowed(text);
        }
        COMMENT_PATTERN.replace_all(text, "")
    }

    /// Decode the predefined XML entities and numeric character references.
    /// Unknown or invalid references are left untouched.
    pub fn decode_entities(text: &str) -> String {
        if !text.contains('&') {
            return text.to_string();
        }

        ENTITY_PATTERN
            .replace_all(text, |caps: &regex::Captures<'_>| {
                if let Some(named) = caps.get(1) {
                    return match named.as_str() {
                        "amp" => "&",
                        "lt" => "<",
                        "gt" => ">",
                        "quot" => "\"",
                        _ => "'",
                    }
                    .to_string();
                }

                let code = match (caps.get(2), caps.get(3)) {
                    (Some(dec), _) => dec.as_str().parse::<u32>().ok(),
                    (_, Some(hex)) => u32::from_str_radix(hex.as_str(), 16).ok(),
                    _ => None,
                };

                code.and_then(char::from_u32)
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILTERS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project ToolsVersion="4.0" xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <ItemGroup>
    <ClCompile Include="..\..\Source\Game\Actor.cpp">
      <Filter>Source\Game</Filter>
    </ClCompile>
    <ClInclude Include='..\..\Source\Game\Actor.h' />
    <None Include="..\..\Game.uproject" />
    <ClCompile Include="..\..\Source\R&amp;D\Lab.cpp" />
  </ItemGroup>
</Project>
"#;

    #[test]
    fn test_extract_items() {
        let items = descriptor::extract_items(FILTERS);
        let includes: Vec<_> = items.iter().map(|i| i.include.as_str()).collect();

        assert_eq!(
            includes,
            vec![
                r"..\..\Source\Game\Actor.cpp",
                r"..\..\Source\Game\Actor.h",
                r"..\..\Source\R&D\Lab.cpp",
            ]
        );
        assert_eq!(items[0].kind, descriptor::ItemKind::Compile);
        assert_eq!(items[1].kind, descriptor::ItemKind::Include);
    }

    #[test]
    fn test_similar_element_names_are_not_items() {
        let text = r#"<Project><ItemGroup>
    <ClCompileExtra Include="x.cpp" />
</ItemGroup></Project>"#;
        assert!(descriptor::extract_items(text).is_empty());
    }

    #[test]
    fn test_commented_out_items_are_skipped() {
        let text = r#"<Project><ItemGroup>
    <!-- <ClCompile Include="Old.cpp" /> -->
    <ClCompile Include="Kept.cpp" />
    <!--
    <ClInclude Include="Old.h" />
    -->
  </ItemGroup></Project>"#;

        let items = descriptor::extract_items(text);
        let includes: Vec<_> = items.iter().map(|i| i.include.as_str()).collect();
        assert_eq!(includes, vec!["Kept.cpp"]);
    }

    #[test]
    fn test_complete_project_detection() {
        assert!(descriptor::is_complete_project(FILTERS));
        assert!(!descriptor::is_complete_project(&FILTERS[..FILTERS.len() / 2]));
        assert!(!descriptor::is_complete_project("not xml at all"));
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(xml::decode_entities("a &lt;b&gt; &quot;c&quot;"), "a <b> \"c\"");
        assert_eq!(xml::decode_entities("&#65;&#x42;"), "AB");
        assert_eq!(xml::decode_entities("&bogus; &#xFFFFFFFF;"), "&bogus; &#xFFFFFFFF;");
    }
}
