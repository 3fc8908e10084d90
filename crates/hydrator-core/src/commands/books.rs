//! Local book directory and the `!books` / `!book` commands.
//!
//! Books are `.txt` files in one directory, discovered once at startup.
//! Lookup is exact after normalization: lower-case, then strip one trailing
//! `.txt`. There is no fuzzy or partial matching.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::BoxFuture;
use crate::snippet::CommandResult;

use super::{CommandError, CommandHandler, REGISTRY_SOURCE};

const DIRECTORY_SOURCE: &str = "LocalBookDirectory";
const FILE_SOURCE: &str = "LocalBookFile";
const BOOK_SUFFIX: &str = ".txt";

/// The set of books available for lookup. Read-only after [`BookLibrary::scan`].
#[derive(Debug, Clone, Default)]
pub struct BookLibrary {
    dir: PathBuf,
    books: Vec<String>,
}

impl BookLibrary {
    /// Scan `dir` for regular `.txt` files.
    ///
    /// A missing, empty or unreadable directory logs a warning and yields an
    /// empty library.
    pub async fn scan(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        info!(dir = %dir.display(), "Scanning for book files");

        let books = match list_books(&dir).await {
            Ok(books) if books.is_empty() => {
                warn!(dir = %dir.display(), "No .txt files found in books directory");
                books
            }
            Ok(books) => {
                info!(count = books.len(), books = ?books, "Found books");
                books
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(dir = %dir.display(), "Books directory not found, no books will be available");
                Vec::new()
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Error scanning books directory, no books will be available");
                Vec::new()
            }
        };

        Self { dir, books }
    }

    /// A library over an explicit list of identifiers, kept in the given order.
    pub fn with_books(dir: impl Into<PathBuf>, books: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            books,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Book identifiers (file names), in lookup order.
    pub fn books(&self) -> &[String] {
        &self.books
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// First book whose normalized identifier equals the normalized `query`.
    pub fn find(&self, query: &str) -> Option<&str> {
        let wanted = normalize_title(query);
        self.books
            .iter()
            .find(|book| normalize_title(book) == wanted)
            .map(String::as_str)
    }

    /// Read the full text of book `id`.
    pub async fn read(&self, id: &str) -> std::io::Result<String> {
        tokio::fs::read_to_string(self.dir.join(id)).await
    }
}

/// Lower-case `title` and strip one trailing `.txt`.
pub fn normalize_title(title: &str) -> String {
    let lower = title.to_lowercase();
    match lower.strip_suffix(BOOK_SUFFIX) {
        Some(stem) => stem.to_string(),
        None => lower,
    }
}

async fn list_books(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut books = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !name.ends_with(BOOK_SUFFIX) {
            continue;
        }
        // Follows symlinks; dangling links are skipped.
        if matches!(tokio::fs::metadata(entry.path()).await, Ok(meta) if meta.is_file()) {
            books.push(name);
        }
    }
    books.sort();
    Ok(books)
}

/// Look up `query` and render the book's content.
///
/// `command_query` is echoed verbatim in the result.
async fn lookup_book(library: &BookLibrary, query: &str, command_query: String) -> CommandResult {
    if library.is_empty() {
        return CommandResult::new(
            command_query,
            "No books available to search. Please check the BOOKS_DIR_PATH configuration.",
            DIRECTORY_SOURCE,
        );
    }

    let Some(id) = library.find(query) else {
        info!(query, "No matching book found");
        return CommandResult::new(
            command_query,
            format!("Book matching query '{query}' not found. Try '!books' to see available titles."),
            DIRECTORY_SOURCE,
        );
    };
    debug!(query, book = id, "Matched book");

    match library.read(id).await {
        Ok(text) => CommandResult::new(
            command_query,
            format!("Content for {id}:\n\n{text}"),
            format!("{FILE_SOURCE}:{id}"),
        ),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            error!(book = id, dir = %library.dir().display(), "Matched book file is missing on disk");
            CommandResult::new(
                command_query,
                format!("Error: Book file '{id}' was matched but could not be found on disk."),
                FILE_SOURCE,
            )
        }
        Err(e) => {
            error!(book = id, error = %e, "Error reading book file");
            CommandResult::new(
                command_query,
                format!("Error reading content for book '{id}': {e}"),
                format!("{FILE_SOURCE}:{id}"),
            )
        }
    }
}

/// `!books [title …]`: list the library, or show one book when the first
/// argument names it.
pub struct ListBooksCommand {
    library: Arc<BookLibrary>,
}

impl ListBooksCommand {
    pub fn new(library: Arc<BookLibrary>) -> Self {
        Self { library }
    }
}

impl CommandHandler for ListBooksCommand {
    fn run<'a>(&'a self, args: &'a [String]) -> BoxFuture<'a, Result<CommandResult, CommandError>> {
        Box::pin(async move {
            if let Some(first) = args.first()
                && let Some(id) = self.library.find(first)
            {
                info!(book = id, "!books argument names a book, showing its content");
                let command_query = format!("!books {}", args.join(" "));
                return Ok(lookup_book(&self.library, id, command_query).await);
            }

            if self.library.is_empty() {
                return Ok(CommandResult::new(
                    "!books",
                    "No books available. Please check the configuration for BOOKS_DIR_PATH.",
                    DIRECTORY_SOURCE,
                ));
            }

            let listing: Vec<String> = self
                .library
                .books()
                .iter()
                .map(|book| format!("- {book}"))
                .collect();
            Ok(CommandResult::new(
                "!books",
                format!("Available books:\n{}", listing.join("\n")),
                DIRECTORY_SOURCE,
            ))
        })
    }
}

/// `!book <title>` and its alias `!b`.
pub struct BookDetailCommand {
    library: Arc<BookLibrary>,
}

impl BookDetailCommand {
    pub fn new(library: Arc<BookLibrary>) -> Self {
        Self { library }
    }
}

impl CommandHandler for BookDetailCommand {
    fn run<'a>(&'a self, args: &'a [String]) -> BoxFuture<'a, Result<CommandResult, CommandError>> {
        Box::pin(async move {
            let query = args.join(" ").trim().to_string();
            if query.is_empty() {
                return Ok(CommandResult::new(
                    "!book",
                    "Usage: !book <query> or !b <query>. Please provide a search query for the book title.",
                    REGISTRY_SOURCE,
                ));
            }
            let command_query = format!("!book {query}");
            Ok(lookup_book(&self.library, &query, command_query).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn library_with(files: &[(&str, &str)]) -> (TempDir, Arc<BookLibrary>) {
        let dir = TempDir::new().unwrap();
        for (name, text) in files {
            std::fs::write(dir.path().join(name), text).unwrap();
        }
        let library = BookLibrary::scan(dir.path()).await;
        (dir, Arc::new(library))
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("The Great Gatsby.txt"), "the great gatsby");
        assert_eq!(normalize_title("moby dick.TXT"), "moby dick");
        assert_eq!(normalize_title("notes.txt.txt"), "notes.txt");
        assert_eq!(normalize_title("plain"), "plain");
    }

    #[test]
    fn test_find_matches_exactly_after_normalization() {
        let library = BookLibrary::with_books(
            "/books",
            args(&["The Great Gatsby.txt", "Moby Dick.txt"]),
        );
        assert_eq!(library.find("the great gatsby"), Some("The Great Gatsby.txt"));
        assert_eq!(library.find("moby dick.txt"), Some("Moby Dick.txt"));
        assert_eq!(library.find("MOBY DICK"), Some("Moby Dick.txt"));
        assert_eq!(library.find("moby"), None);
        assert_eq!(library.find("great gatsby"), None);
    }

    #[test]
    fn test_find_not_found() {
        let library = BookLibrary::with_books("/books", args(&["Some Book.txt"]));
        assert_eq!(library.find("nonexistent book"), None);
    }

    #[test]
    fn test_find_first_match_wins() {
        let library = BookLibrary::with_books("/books", args(&["dup.txt", "DUP.txt"]));
        assert_eq!(library.find("Dup"), Some("dup.txt"));
    }

    #[tokio::test]
    async fn test_scan_lists_sorted_txt_files_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("notes.md"), "md").unwrap();
        std::fs::write(dir.path().join("SHOUT.TXT"), "upper").unwrap();
        std::fs::create_dir(dir.path().join("folder.txt")).unwrap();

        let library = BookLibrary::scan(dir.path()).await;
        assert_eq!(library.books(), &["a.txt".to_string(), "b.txt".to_string()]);
        assert_eq!(library.dir(), dir.path());
    }

    #[test_log::test(tokio::test)]
    async fn test_scan_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let library = BookLibrary::scan(dir.path().join("missing")).await;
        assert!(library.is_empty());
    }

    #[tokio::test]
    async fn test_list_books() {
        let (_dir, library) = library_with(&[("b.txt", ""), ("a.txt", "")]).await;
        let result = ListBooksCommand::new(library).run(&[]).await.unwrap();
        assert_eq!(result.command_query, "!books");
        assert_eq!(result.result_text, "Available books:\n- a.txt\n- b.txt");
        assert_eq!(result.source, "LocalBookDirectory");
    }

    #[tokio::test]
    async fn test_list_books_empty() {
        let library = Arc::new(BookLibrary::default());
        let result = ListBooksCommand::new(library).run(&[]).await.unwrap();
        assert_eq!(result.command_query, "!books");
        assert_eq!(
            result.result_text,
            "No books available. Please check the configuration for BOOKS_DIR_PATH."
        );
    }

    #[tokio::test]
    async fn test_list_books_with_unmatched_argument_lists() {
        let (_dir, library) = library_with(&[("a.txt", "")]).await;
        let result = ListBooksCommand::new(library)
            .run(&args(&["and", "also"]))
            .await
            .unwrap();
        assert_eq!(result.command_query, "!books");
        assert_eq!(result.result_text, "Available books:\n- a.txt");
    }

    #[tokio::test]
    async fn test_list_books_delegates_to_detail() {
        let (_dir, library) = library_with(&[("Dune.txt", "Spice.")]).await;
        let result = ListBooksCommand::new(library)
            .run(&args(&["dune", "what", "is", "this"]))
            .await
            .unwrap();
        assert_eq!(result.command_query, "!books dune what is this");
        assert_eq!(result.result_text, "Content for Dune.txt:\n\nSpice.");
        assert_eq!(result.source, "LocalBookFile:Dune.txt");
    }

    #[tokio::test]
    async fn test_book_detail_reads_content() {
        let (_dir, library) =
            library_with(&[("The Great Gatsby.txt", "In my younger and more vulnerable years")])
                .await;
        let result = BookDetailCommand::new(library)
            .run(&args(&["the", "great", "gatsby"]))
            .await
            .unwrap();
        assert_eq!(result.command_query, "!book the great gatsby");
        assert_eq!(
            result.result_text,
            "Content for The Great Gatsby.txt:\n\nIn my younger and more vulnerable years"
        );
        assert_eq!(result.source, "LocalBookFile:The Great Gatsby.txt");
    }

    #[tokio::test]
    async fn test_book_detail_usage() {
        let (_dir, library) = library_with(&[("a.txt", "")]).await;
        let result = BookDetailCommand::new(library).run(&[]).await.unwrap();
        assert_eq!(result.command_query, "!book");
        assert!(result.result_text.starts_with("Usage: !book <query> or !b <query>."));
        assert_eq!(result.source, "CommandRegistry");
    }

    #[tokio::test]
    async fn test_book_detail_no_books() {
        let result = BookDetailCommand::new(Arc::new(BookLibrary::default()))
            .run(&args(&["anything"]))
            .await
            .unwrap();
        assert_eq!(
            result.result_text,
            "No books available to search. Please check the BOOKS_DIR_PATH configuration."
        );
        assert_eq!(result.source, "LocalBookDirectory");
    }

    #[tokio::test]
    async fn test_book_detail_not_found() {
        let (_dir, library) = library_with(&[("Some Book.txt", "")]).await;
        let result = BookDetailCommand::new(library)
            .run(&args(&["nonexistent", "book"]))
            .await
            .unwrap();
        assert_eq!(
            result.result_text,
            "Book matching query 'nonexistent book' not found. Try '!books' to see available titles."
        );
        assert_eq!(result.source, "LocalBookDirectory");
    }

    #[tokio::test]
    async fn test_book_detail_vanished_file() {
        let (dir, library) = library_with(&[("Gone.txt", "soon")]).await;
        std::fs::remove_file(dir.path().join("Gone.txt")).unwrap();

        let result = BookDetailCommand::new(library)
            .run(&args(&["gone"]))
            .await
            .unwrap();
        assert_eq!(
            result.result_text,
            "Error: Book file 'Gone.txt' was matched but could not be found on disk."
        );
        assert_eq!(result.source, "LocalBookFile");
    }

    #[tokio::test]
    async fn test_book_detail_read_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("binary.txt"), [0xff, 0xfe, 0x00]).unwrap();
        let library = Arc::new(BookLibrary::scan(dir.path()).await);

        let result = BookDetailCommand::new(library)
            .run(&args(&["binary"]))
            .await
            .unwrap();
        assert!(
            result
                .result_text
                .starts_with("Error reading content for book 'binary.txt': ")
        );
        assert_eq!(result.source, "LocalBookFile:binary.txt");
    }
}
