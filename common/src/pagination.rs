//! Abstractions for cursor-based pagination.

/// Generic pagination connection.
///
/// [`Edge`]s are always kept in the ascending order of their cursors, no
/// matter the pagination direction.
#[derive(Clone, Debug)]
pub struct Connection<C, I> {
    /// [`Edge`]s in this [`Connection`].
    pub edges: Vec<Edge<C, I>>,

    /// [`Kind`] of this [`Connection`].
    pub kind: Kind,

    /// Indicator whether this [`Connection`] has more nodes in its direction.
    pub has_more: bool,
}

/// A page in a [`Connection`].
pub type Page<C, I> = Connection<C, I>;

impl<C, I> Connection<C, I> {
    /// Creates a new [`Connection`] from the provided [`Edge`]s.
    #[must_use]
    pub fn new(
        args: &Arguments<C>,
        edges: impl IntoIterator<Item = impl Into<Edge<C, I>>>,
        has_more: bool,
    ) -> Self {
        Self {
            edges: edges.into_iter().map(Into::into).collect(),
            kind: args.kind(),
            has_more,
        }
    }

    /// Creates a new [`Connection`] from the [`Edge`]s fetched in the
    /// [`Kind::order()`] with the [`Arguments::fetch_limit()`].
    ///
    /// The extra fetched [`Edge`] (if any) is only used to detect whether
    /// there are more nodes.
    #[must_use]
    pub fn from_fetched(
        args: &Arguments<C>,
        fetched: impl IntoIterator<Item = impl Into<Edge<C, I>>>,
    ) -> Self {
        let mut edges = fetched
            .into_iter()
            .map(Into::into)
            .take(args.fetch_limit())
            .collect::<Vec<_>>();
        let has_more = edges.len() > args.limit();
        edges.truncate(args.limit());
        if args.kind().is_backward() {
            edges.reverse();
        }
        Self {
            edges,
            kind: args.kind(),
            has_more,
        }
    }

    /// Returns [`PageInfo`] of this [`Connection`].
    #[must_use]
    pub fn page_info(&self) -> PageInfo<C>
    where
        C: Clone,
    {
        PageInfo {
            start_cursor: self.edges.first().map(|e| e.cursor.clone()),
            end_cursor: self.edges.last().map(|e| e.cursor.clone()),
            has_next_page: self.has_more && self.kind.is_forward(),
            has_previous_page: self.has_more && self.kind.is_backward(),
        }
    }
}

/// Information about a page in a [`Connection`].
#[derive(Clone, Copy, Debug)]
pub struct PageInfo<C> {
    /// First cursor on this page.
    pub start_cursor: Option<C>,

    /// Last cursor on this page.
    pub end_cursor: Option<C>,

    /// Indicator whether [`Connection`] has a next page.
    pub has_next_page: bool,

    /// Indicator whether [`Connection`] has a previous page.
    pub has_previous_page: bool,
}

/// An edge in a [`Connection`].
#[derive(Clone, Copy, Debug)]
pub struct Edge<C, I> {
    /// Cursor of this [`Edge`].
    pub cursor: C,

    /// Node of this [`Edge`].
    pub node: I,
}

impl<C, I> From<(C, I)> for Edge<C, I> {
    fn from((cursor, node): (C, I)) -> Self {
        Self { cursor, node }
    }
}

/// Pagination arguments.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Arguments<C> {
    /// Forward pagination.
    Forward {
        /// Number of items to return.
        first: usize,

        /// Cursor after which to return items.
        after: Option<C>,
    },

    /// Backward pagination.
    Backward {
        /// Number of items to return.
        last: usize,

        /// Cursor before which to return items.
        before: Option<C>,
    },
}

impl<C> Arguments<C> {
    /// Creates new [`Arguments`] out of the raw GraphQL-like ones.
    ///
    /// [`None`] is returned if the arguments are ambiguous (both directions
    /// are requested) or the sizes are out of range.
    pub fn new<Num>(
        first: Option<Num>,
        after: Option<C>,
        last: Option<Num>,
        before: Option<C>,
        default: Num,
    ) -> Option<Self>
    where
        Num: TryInto<usize>,
    {
        Some(match (first, after, last, before) {
            (first, after, None, None) => Self::Forward {
                first: first.unwrap_or(default).try_into().ok()?,
                after,
            },
            (None, None, Some(last), before) => Self::Backward {
                last: last.try_into().ok()?,
                before,
            },
            (None, None, None, before @ Some(_)) => Self::Backward {
                last: default.try_into().ok()?,
                before,
            },
            _ => return None,
        })
    }

    /// Returns cursor requested by this [`Arguments`].
    #[must_use]
    pub fn cursor(&self) -> Option<&C> {
        match self {
            Self::Forward { after, .. } => after.as_ref(),
            Self::Backward { before, .. } => before.as_ref(),
        }
    }

    /// Returns [`Kind`] of pagination this [`Arguments`] requests.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::Forward { .. } => Kind::Forward,
            Self::Backward { .. } => Kind::Backward,
        }
    }

    /// Returns limit requested by this [`Arguments`].
    #[must_use]
    pub fn limit(&self) -> usize {
        match *self {
            Self::Forward { first, .. } => first,
            Self::Backward { last, .. } => last,
        }
    }

    /// Returns the number of items to fetch from a storage to fill a page and
    /// detect whether there are more items.
    #[must_use]
    pub fn fetch_limit(&self) -> usize {
        self.limit().saturating_add(1)
    }
}

/// Pagination selector.
#[derive(Clone, Copy, Debug)]
pub struct Selector<C, F> {
    /// Pagination [`Arguments`].
    pub arguments: Arguments<C>,

    /// Additional filter being applied to the result.
    pub filter: F,
}

/// Kind (direction) of pagination.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Kind {
    /// Forward pagination.
    Forward,

    /// Backward pagination.
    Backward,
}

impl Kind {
    /// Returns whether this [`Kind`] is forward.
    #[must_use]
    pub const fn is_forward(&self) -> bool {
        matches!(self, Self::Forward)
    }

    /// Returns whether this [`Kind`] is backward.
    #[must_use]
    pub const fn is_backward(&self) -> bool {
        matches!(self, Self::Backward)
    }

    /// Returns comparison operator selecting items past a cursor.
    #[must_use]
    pub const fn operator(&self) -> &'static str {
        match self {
            Self::Forward => ">",
            Self::Backward => "<",
        }
    }

    /// Returns [`Order`] items should be fetched in.
    #[must_use]
    pub const fn order(&self) -> Order {
        match self {
            Self::Forward => Order::Ascending,
            Self::Backward => Order::Descending,
        }
    }
}

/// Order of pagination.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Order {
    /// Ascending order.
    Ascending,

    /// Descending order.
    Descending,
}

impl Order {
    /// Returns SQL keyword representing this [`Order`].
    #[cfg(feature = "postgres")]
    #[must_use]
    pub const fn sql(&self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Defines pagination types.
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_pagination {
    ($cursor:ty, $node:ty, $filter:ty) => {
        #[doc = "Edge of a [`Connection`]."]
        pub type Edge = $crate::pagination::Edge<$cursor, $node>;

        #[doc = "A [`Connection`] of nodes."]
        pub type Connection = $crate::pagination::Connection<$cursor, $node>;

        #[doc = "A [`Page`] of nodes."]
        pub type Page = $crate::pagination::Page<$cursor, $node>;

        #[doc = "An information about a [`Page`]."]
        pub type PageInfo = $crate::pagination::PageInfo<$cursor>;

        #[doc = "Arguments for selecting a [`Page`]."]
        pub type Arguments = $crate::pagination::Arguments<$cursor>;

        #[doc = "[`Page`] selector."]
        pub type Selector = $crate::pagination::Selector<$cursor, $filter>;
    };
}

#[cfg(test)]
mod spec {
    use super::{Arguments, Connection, Kind};

    #[test]
    fn parses_arguments() {
        assert_eq!(
            Arguments::<u8>::new(None, None, None, None, 10),
            Some(Arguments::Forward {
                first: 10,
                after: None,
            }),
        );
        assert_eq!(
            Arguments::new(Some(3), Some(1_u8), None, None, 10),
            Some(Arguments::Forward {
                first: 3,
                after: Some(1),
            }),
        );
        assert_eq!(
            Arguments::new(None, None, Some(2), Some(9_u8), 10),
            Some(Arguments::Backward {
                last: 2,
                before: Some(9),
            }),
        );
        assert_eq!(
            Arguments::new(None, None, None, Some(9_u8), 10),
            Some(Arguments::Backward {
                last: 10,
                before: Some(9),
            }),
        );

        assert_eq!(
            Arguments::<u8>::new(Some(1), None, Some(1), None, 10_i32),
            None,
        );
        assert_eq!(Arguments::<u8>::new(Some(-1), None, None, None, 10), None);
    }

    #[test]
    fn trims_fetched_edges() {
        let args = Arguments::new(Some(2), None, None, None, 10).unwrap();
        let page: Connection<u8, &str> =
            Connection::from_fetched(&args, [(1, "a"), (2, "b"), (3, "c")]);

        assert_eq!(page.edges.len(), 2);
        assert_eq!(page.kind, Kind::Forward);
        let info = page.page_info();
        assert!(info.has_next_page);
        assert!(!info.has_previous_page);
        assert_eq!(info.start_cursor, Some(1));
        assert_eq!(info.end_cursor, Some(2));
    }

    #[test]
    fn reverses_backward_edges() {
        let args = Arguments::new(None, None, Some(5), Some(9), 10).unwrap();
        let page: Connection<u8, &str> =
            Connection::from_fetched(&args, [(8, "c"), (7, "b"), (6, "a")]);

        assert!(!page.has_more);
        assert_eq!(
            page.edges.iter().map(|e| e.cursor).collect::<Vec<_>>(),
            [6, 7, 8],
        );
    }
}
