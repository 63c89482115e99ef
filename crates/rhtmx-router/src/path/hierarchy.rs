/// Iterator over a path and its ancestors, deepest first
///
/// `/a/b/c` yields `/a/b/c`, `/a/b`, `/a`, `/`. Borrows from the input and
/// never allocates, so `find` stops at the first match for free.
///
/// ```
/// use rhtmx_router::path::PathHierarchy;
///
/// let parents: Vec<&str> = PathHierarchy::new("/a/b").skip(1).collect();
/// assert_eq!(parents, vec!["/a", "/"]);
/// ```
#[derive(Debug, Clone)]
pub struct PathHierarchy<'a> {
    current: Option<&'a str>,
}

impl<'a> PathHierarchy<'a> {
    pub fn new(path: &'a str) -> Self {
        Self {
            current: Some(path),
        }
    }

    /// Ancestors only, excluding the path itself and the root
    pub fn ancestors(path: &'a str) -> impl Iterator<Item = &'a str> {
        Self::new(path).skip(1).filter(|candidate| *candidate != "/")
    }
}

impl<'a> Iterator for PathHierarchy<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;

        self.current = match current.rfind('/') {
            _ if current == "/" => None,
            Some(0) => Some("/"),
            Some(slash) => Some(&current[..slash]),
            None => None,
        };

        Some(current)
    }
}
