//! Purpose: Split a response body holding back-to-back JSON objects into one slice per object.
//! Exports: `split_jsons`.
//! Role: Reverses the server's undelimited multi-object streaming before JSON decoding.
//! Invariants: Braces inside string literals (including escaped quotes) never move the depth.
//! Invariants: Trailing non-whitespace after the last balanced object is returned as one extra slice.
//! Notes: Never fails; rejecting malformed fragments is left to the decode step.

/// Returns each top-level `{...}` object of `input` in order, borrowing from `input`.
pub fn split_jsons(input: &str) -> Vec<&str> {
    let bytes = input.as_bytes();
    let mut fragments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut inside_string = false;
    let mut escaped = false;
    let mut consumed = 0usize;

    for (index, byte) in bytes.iter().enumerate() {
        if inside_string {
            if escaped {
                escaped = false;
            } else if *byte == b'\\' {
                escaped = true;
            } else if *byte == b'"' {
                inside_string = false;
            }
            continue;
        }
        match byte {
            b'"' => inside_string = true,
            b'{' => {
                depth += 1;
                if depth == 1 {
                    start = index;
                }
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    fragments.push(&input[start..=index]);
                    consumed = index + 1;
                }
            }
            _ => {}
        }
    }

    let remainder = input[consumed..].trim();
    if !remainder.is_empty() {
        fragments.push(remainder);
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::split_jsons;
    use serde_json::Value;

    #[test]
    fn splits_concatenated_objects_with_mixed_separators() {
        let input = r#"
            { "aaa": "bbb" }
            {
                "ccc": "ddd",
                "eee": "fff"
            }{ "ggg": "{0} = }" }{ "hhh": "{" }

            {}

            { "key": "value with a \" (escaped quote)" }{ "key": "\"\"\"" }

            {"invalid}": "data"
        "#;

        let fragments = split_jsons(input);
        assert_eq!(
            fragments,
            vec![
                r#"{ "aaa": "bbb" }"#,
                "{\n                \"ccc\": \"ddd\",\n                \"eee\": \"fff\"\n            }",
                r#"{ "ggg": "{0} = }" }"#,
                r#"{ "hhh": "{" }"#,
                "{}",
                r#"{ "key": "value with a \" (escaped quote)" }"#,
                r#"{ "key": "\"\"\"" }"#,
                r#"{"invalid}": "data""#,
            ]
        );
    }

    #[test]
    fn single_object_is_returned_trimmed() {
        let fragments = split_jsons("  { \"aaa\": \"bbb\" }\n");
        assert_eq!(fragments, vec![r#"{ "aaa": "bbb" }"#]);
    }

    #[test]
    fn unbalanced_input_is_returned_whole() {
        let input = r#"{"invalid}": "data""#;
        assert_eq!(split_jsons(input), vec![input]);
    }

    #[test]
    fn empty_and_blank_inputs_yield_nothing() {
        assert!(split_jsons("").is_empty());
        assert!(split_jsons(" \n\t ").is_empty());
    }

    #[test]
    fn escaped_backslash_before_closing_quote_ends_string() {
        let input = r#"{"path":"C:\\"}{"next":"}"}"#;
        let fragments = split_jsons(input);
        assert_eq!(fragments, vec![r#"{"path":"C:\\"}"#, r#"{"next":"}"}"#]);
        for fragment in fragments {
            serde_json::from_str::<Value>(fragment).expect("fragment decodes");
        }
    }

    #[test]
    fn nested_objects_stay_in_one_fragment() {
        let input = r#"{"success":{"eventTime":1,"key":"a"},"failure":null}{"success":null,"failure":{"errorCode":"X","errorMessage":"{"}}"#;
        let fragments = split_jsons(input);
        assert_eq!(fragments.len(), 2);
        let second: Value = serde_json::from_str(fragments[1]).expect("json");
        assert_eq!(second["failure"]["errorMessage"], "{");
    }

    #[test]
    fn non_object_body_is_a_single_fragment() {
        assert_eq!(split_jsons("Request timed out"), vec!["Request timed out"]);
    }
}
