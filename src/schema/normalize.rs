/// Canonical snake-case form of an entity or field name.
///
/// One single form is used for schema descriptors, bundler routing keys, and
/// output directories, so a change arriving as `BlockMeta` always resolves
/// to the `block_meta` bundler.
pub fn normalize_entity_key(name: &str) -> String {
    to_snake(name)
}

/// Snake-cases an identifier with acronym and digit handling:
/// `BlockMeta` → `block_meta`, `feeGrowthGlobal0X128` → `fee_growth_global_0x128`,
/// `parseURLValue` → `parse_url_value`.
pub fn to_snake(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + input.len() / 4);

    for (index, &curr) in chars.iter().enumerate() {
        let prev = index.checked_sub(1).map(|i| chars[i]);
        let next = chars.get(index + 1).copied();

        if curr.is_whitespace() || matches!(curr, '*' | '.' | ',') {
            // Delimiters collapse into a separator.
            if !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
            continue;
        }

        if let Some(prev) = prev {
            if split_before(prev, curr, next) && !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
        }

        out.push(curr.to_ascii_lowercase());
    }

    out.trim_matches('_').to_string()
}

fn split_before(prev: char, curr: char, next: Option<char>) -> bool {
    let is_upper = |c: char| c.is_uppercase();
    let is_lower = |c: char| c.is_lowercase();
    let is_digit = |c: char| c.is_ascii_digit();

    // Digit following a lowercase letter starts a new word, but an
    // uppercase prefix keeps formats like `X128` together.
    if is_digit(curr) && !is_digit(prev) {
        return !is_upper(prev);
    }

    // Letter following a digit starts a new word unless it is uppercase
    // (handled by the case rule below when its own word ends).
    if is_digit(prev) && !is_digit(curr) && is_lower(curr) {
        return true;
    }

    // lowerUpper boundary, except when squeezed between digits.
    if !is_upper(prev) && is_upper(curr) {
        let squeezed = is_digit(prev) && next.map(is_digit).unwrap_or(false);
        return !squeezed;
    }

    // Acronym end: `URLValue` splits before `Value`.
    if is_upper(prev) && is_upper(curr) && next.map(is_lower).unwrap_or(false) {
        return true;
    }

    false
}
