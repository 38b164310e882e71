//! Splits `${...}` segments out of string literals.
//!
//! The evaluator hands each inner segment back through the parser at runtime,
//! so this only has to find segment boundaries, not understand expressions.

pub fn interpolate<E>(
    input: &str,
    mut eval: impl FnMut(&str) -> Result<String, E>,
) -> Result<String, E> {
    if !input.contains("${") {
        return Ok(input.to_string());
    }
    let chars: Vec<char> = input.chars().collect();
    let mut parts: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut found = false;
    let mut open = false;
    for (i, &ch) in chars.iter().enumerate() {
        match ch {
            '$' if i + 1 < chars.len() && chars[i + 1] == '{' => {
                found = true;
                continue;
            }
            '{' if found => {
                parts.push(std::mem::take(&mut buf));
                open = true;
                found = false;
                continue;
            }
            '}' if open => {
                parts.push(eval(&buf)?);
                buf.clear();
                open = false;
                continue;
            }
            _ => {}
        }
        buf.push(ch);
        found = false;
    }
    parts.push(buf);
    Ok(parts.concat())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upper(expr: &str) -> Result<String, ()> {
        Ok(expr.to_uppercase())
    }

    #[test]
    fn passes_through_plain_strings() {
        assert_eq!(interpolate("hello", upper), Ok("hello".to_string()));
        assert_eq!(interpolate("{x}", upper), Ok("{x}".to_string()));
    }

    #[test]
    fn evaluates_segments_in_place() {
        assert_eq!(interpolate("a ${x} b", upper), Ok("a X b".to_string()));
        assert_eq!(
            interpolate("${x}${y}", upper),
            Ok("XY".to_string())
        );
    }

    #[test]
    fn keeps_surrounding_text_intact() {
        assert_eq!(
            interpolate("cost: $${price}!", upper),
            Ok("cost: $PRICE!".to_string())
        );
    }

    #[test]
    fn propagates_segment_errors() {
        let result = interpolate("x ${boom}", |_| Err("bad"));
        assert_eq!(result, Err("bad"));
    }
}
