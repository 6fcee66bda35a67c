//! Splitting migration files into individual statements.

/// Split SQL into individual statements.
///
/// Semicolons only terminate a statement outside of string literals, quoted
/// identifiers, dollar-quoted bodies and comments, so PL/pgSQL functions and
/// literals such as `'a;b'` survive intact. Statements made only of
/// whitespace and comments are dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let len = chars.len();

    let mut statements = Vec::new();
    let mut start = 0;
    let mut has_code = false;
    let mut i = 0;

    while i < len {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            '-' if next == Some('-') => {
                while i < len && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if next == Some('*') => {
                i = skip_block_comment(&chars, i);
            }
            '\'' => {
                has_code = true;
                let backslash_escapes = is_escape_string(&chars, i);
                i = skip_quoted(&chars, i, '\'', backslash_escapes);
            }
            '"' => {
                has_code = true;
                i = skip_quoted(&chars, i, '"', false);
            }
            '$' => {
                has_code = true;
                match dollar_tag_len(&chars, i) {
                    Some(tag_len) => i = skip_dollar_quoted(&chars, i, tag_len),
                    None => i += 1,
                }
            }
            ';' => {
                push_statement(&mut statements, &chars[start..i], has_code);
                has_code = false;
                i += 1;
                start = i;
            }
            c => {
                if !c.is_whitespace() {
                    has_code = true;
                }
                i += 1;
            }
        }
    }

    // The last statement might not end with ;
    push_statement(&mut statements, &chars[start..], has_code);

    statements
}

/// Whether `statement` is a bare transaction-control command such as
/// `BEGIN` or `COMMIT` that is a no-op inside an open transaction.
pub fn is_transaction_control(statement: &str) -> bool {
    let words = keywords(statement);
    let words: Vec<&str> = words.iter().map(String::as_str).collect();

    match words.as_slice() {
        ["BEGIN"] | ["BEGIN", "WORK" | "TRANSACTION"] | ["START", "TRANSACTION"] => true,
        ["COMMIT" | "END", rest @ ..] => matches!(strip_work(rest), [] | ["AND", "NO", "CHAIN"]),
        _ => false,
    }
}

/// Whether `statement` would end the surrounding transaction early.
///
/// `ROLLBACK`, `ABORT`, `COMMIT AND CHAIN` and `PREPARE TRANSACTION` all
/// close the open transaction, after which later statements autocommit.
/// `ROLLBACK TO SAVEPOINT` stays inside the transaction and is not matched.
pub fn ends_transaction(statement: &str) -> bool {
    let words = keywords(statement);
    let words: Vec<&str> = words.iter().map(String::as_str).collect();

    match words.as_slice() {
        ["ROLLBACK", rest @ ..] => !matches!(strip_work(rest), ["TO", ..]),
        ["ABORT", ..] => true,
        ["COMMIT" | "END", rest @ ..] => matches!(strip_work(rest), ["AND", "CHAIN"]),
        ["PREPARE", "TRANSACTION", ..] => true,
        _ => false,
    }
}

fn strip_work<'a>(rest: &'a [&'a str]) -> &'a [&'a str] {
    match rest {
        ["WORK" | "TRANSACTION", tail @ ..] => tail,
        _ => rest,
    }
}

/// Upper-cased words of a statement with comments removed.
fn keywords(statement: &str) -> Vec<String> {
    let chars: Vec<char> = statement.chars().collect();
    let mut code = String::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        match (chars[i], chars.get(i + 1).copied()) {
            ('-', Some('-')) => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            ('/', Some('*')) => {
                i = skip_block_comment(&chars, i);
                code.push(' ');
            }
            (c, _) => {
                code.push(c);
                i += 1;
            }
        }
    }

    code.split_whitespace().map(|w| w.to_ascii_uppercase()).collect()
}

fn push_statement(statements: &mut Vec<String>, chars: &[char], has_code: bool) {
    if !has_code {
        return;
    }
    let stmt: String = chars.iter().collect();
    let stmt = stmt.trim();
    if !stmt.is_empty() {
        statements.push(stmt.to_string());
    }
}

/// Returns the index just past the closing `*/`. Block comments nest.
fn skip_block_comment(chars: &[char], open: usize) -> usize {
    let mut depth = 0;
    let mut i = open;
    while i < chars.len() {
        match (chars[i], chars.get(i + 1).copied()) {
            ('/', Some('*')) => {
                depth += 1;
                i += 2;
            }
            ('*', Some('/')) => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return i;
                }
            }
            _ => i += 1,
        }
    }
    chars.len()
}

/// Returns the index just past the closing quote. A doubled quote is an
/// escaped quote.
fn skip_quoted(chars: &[char], open: usize, quote: char, backslash_escapes: bool) -> usize {
    let mut i = open + 1;
    while i < chars.len() {
        let c = chars[i];
        if backslash_escapes && c == '\\' {
            i += 2;
            continue;
        }
        if c == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

/// `E'...'` strings treat backslash as an escape character.
fn is_escape_string(chars: &[char], quote: usize) -> bool {
    if quote == 0 || !matches!(chars[quote - 1], 'E' | 'e') {
        return false;
    }
    quote < 2 || !is_identifier_char(chars[quote - 2])
}

/// Length of a `$$` or `$tag$` delimiter starting at `at`, if any.
/// Positional parameters like `$1` are not delimiters.
fn dollar_tag_len(chars: &[char], at: usize) -> Option<usize> {
    if at > 0 && is_identifier_char(chars[at - 1]) {
        return None;
    }
    if chars.get(at + 1).is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut j = at + 1;
    while j < chars.len() && is_identifier_char(chars[j]) {
        j += 1;
    }

    if chars.get(j) == Some(&'$') {
        Some(j - at + 1)
    } else {
        None
    }
}

/// Returns the index just past the matching closing delimiter.
fn skip_dollar_quoted(chars: &[char], open: usize, tag_len: usize) -> usize {
    let tag = &chars[open..open + tag_len];
    let mut i = open + tag_len;
    while i + tag_len <= chars.len() {
        if &chars[i..i + tag_len] == tag {
            return i + tag_len;
        }
        i += 1;
    }
    chars.len()
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple_statements() {
        let stmts = split_statements("SELECT 1; SELECT 2; SELECT 3;");
        assert_eq!(stmts, vec!["SELECT 1", "SELECT 2", "SELECT 3"]);
    }

    #[test]
    fn test_split_without_trailing_semicolon() {
        let stmts = split_statements("CREATE TABLE t (id int);\nINSERT INTO t VALUES (1)");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[1], "INSERT INTO t VALUES (1)");
    }

    #[test]
    fn test_split_with_dollar_quoted_function() {
        let sql = r#"
CREATE FUNCTION test() RETURNS void AS $$
BEGIN
    SELECT 1;
    SELECT 2;
END;
$$ LANGUAGE plpgsql;

SELECT 3;
"#;
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("CREATE FUNCTION"));
        assert!(stmts[0].contains("$$ LANGUAGE plpgsql"));
        assert_eq!(stmts[1], "SELECT 3");
    }

    #[test]
    fn test_split_with_tagged_dollar_quote() {
        let sql = "DO $body$ BEGIN PERFORM 1; END $body$; SELECT $1::int;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "DO $body$ BEGIN PERFORM 1; END $body$");
        assert_eq!(stmts[1], "SELECT $1::int");
    }

    #[test]
    fn test_split_ignores_semicolons_in_literals() {
        let sql = r#"INSERT INTO notes VALUES ('a;b', 'it''s; fine'); SELECT "odd;name" FROM t;"#;
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "INSERT INTO notes VALUES ('a;b', 'it''s; fine')");
        assert_eq!(stmts[1], r#"SELECT "odd;name" FROM t"#);
    }

    #[test]
    fn test_split_escape_string() {
        let stmts = split_statements(r"SELECT E'it\'s; here'; SELECT 2;");
        assert_eq!(stmts, vec![r"SELECT E'it\'s; here'", "SELECT 2"]);
    }

    #[test]
    fn test_split_ignores_semicolons_in_comments() {
        let sql = "-- first; still a comment\nSELECT 1; /* block; /* nested; */ done; */ SELECT 2;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].ends_with("SELECT 1"));
        assert!(stmts[1].ends_with("SELECT 2"));
    }

    #[test]
    fn test_split_drops_comment_only_blocks() {
        let sql = "-- header\n;\n/* nothing */;\n  ;\nSELECT 1;\n-- trailing note\n";
        let stmts = split_statements(sql);
        assert_eq!(stmts, vec!["SELECT 1"]);
    }

    #[test]
    fn test_split_empty_input() {
        assert!(split_statements("").is_empty());
        assert!(split_statements("   \n\t").is_empty());
    }

    #[test]
    fn test_transaction_control_detection() {
        assert!(is_transaction_control("BEGIN"));
        assert!(is_transaction_control("begin transaction"));
        assert!(is_transaction_control("-- wrap\nCOMMIT"));
        assert!(is_transaction_control("START   TRANSACTION"));
        assert!(is_transaction_control("end"));

        assert!(is_transaction_control("/* done */ COMMIT AND NO CHAIN"));

        assert!(!is_transaction_control("ROLLBACK"));
        assert!(!is_transaction_control("COMMIT AND CHAIN"));
        assert!(!is_transaction_control("BEGIN ISOLATION LEVEL SERIALIZABLE"));
        assert!(!is_transaction_control("CREATE TABLE begin_log (id int)"));
        assert!(!is_transaction_control("DO $$ BEGIN PERFORM 1; END $$"));
    }

    #[test]
    fn test_statements_that_end_the_transaction() {
        assert!(ends_transaction("ROLLBACK"));
        assert!(ends_transaction("rollback work"));
        assert!(ends_transaction("-- undo\nROLLBACK TRANSACTION AND CHAIN"));
        assert!(ends_transaction("ABORT"));
        assert!(ends_transaction("commit and chain"));
        assert!(ends_transaction("END WORK AND CHAIN"));
        assert!(ends_transaction("PREPARE TRANSACTION 'tx1'"));

        assert!(!ends_transaction("ROLLBACK TO SAVEPOINT before_seed"));
        assert!(!ends_transaction("ROLLBACK WORK TO before_seed"));
        assert!(!ends_transaction("COMMIT"));
        assert!(!ends_transaction("SAVEPOINT before_seed"));
        assert!(!ends_transaction("CREATE TABLE rollback_log (id int)"));
        assert!(!ends_transaction("DO $$ BEGIN ROLLBACK; END $$"));
    }
}
