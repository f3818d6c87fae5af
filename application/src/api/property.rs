//! [`Property`]-related definitions.

use std::future;

use common::{DateTime, Handler as _, Money};
use derive_more::{AsRef, Display, From, Into};
use futures::TryFutureExt as _;
use juniper::{graphql_object, GraphQLObject, GraphQLScalar};
use service::{domain, query};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::{api, api::scalar, AsError, Context, Error};

/// A property listed for rent.
#[derive(Clone, Debug, From)]
pub struct Property {
    /// ID of this [`Property`].
    id: Id,

    /// Underlying [`domain::Property`].
    property: OnceCell<domain::Property>,
}

impl From<domain::Property> for Property {
    fn from(property: domain::Property) -> Self {
        Self {
            id: property.id.into(),
            property: OnceCell::new_with(Some(property)),
        }
    }
}

impl Property {
    /// Creates a new [`Property`] with the provided ID.
    ///
    /// # Safety
    ///
    /// Caller must ensure that [`Property`] with the provided ID exists,
    /// otherwise accessing this [`Property`] will result with an error.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            property: OnceCell::new(),
        }
    }

    /// Returns the underlying [`domain::Property`].
    ///
    /// # Errors
    ///
    /// Errors if the [`domain::Property`] doesn't exist.
    pub(crate) async fn property(
        &self,
        ctx: &Context,
    ) -> Result<&domain::Property, Error> {
        let id = self.id.into();
        self.property
            .get_or_try_init(|| {
                ctx.service()
                    .execute(query::property::ById::by(id))
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())
                    .and_then(|p| {
                        future::ready(p.ok_or_else(|| {
                            api::query::PropertyError::NotExists.into()
                        }))
                    })
            })
            .await
    }
}

/// A property listed for rent.
#[graphql_object(context = Context)]
impl Property {
    /// Unique identifier of this `Property`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Property.id",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn id(&self) -> Id {
        self.id
    }

    /// `User` owning this `Property`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Property.landlord",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn landlord(&self, ctx: &Context) -> Result<api::User, Error> {
        let landlord_id = self.property(ctx).await?.landlord_id;
        #[expect(
            unsafe_code,
            reason = "`Property` loaded from repository guarantees its \
                      landlord existence"
        )]
        let landlord = unsafe { api::User::new_unchecked(landlord_id) };
        Ok(landlord)
    }

    /// Title of this `Property`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Property.title",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn title(&self, ctx: &Context) -> Result<Title, Error> {
        Ok(self.property(ctx).await?.title.clone().into())
    }

    /// Location of this `Property`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Property.location",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn location(&self, ctx: &Context) -> Result<Location, Error> {
        Ok(self.property(ctx).await?.location.clone().into())
    }

    /// Description of this `Property`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Property.description",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn description(
        &self,
        ctx: &Context,
    ) -> Result<Option<Description>, Error> {
        Ok(self.property(ctx).await?.description.clone().map(Into::into))
    }

    /// Nightly rent of this `Property`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Property.rent",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn rent(&self, ctx: &Context) -> Result<Money, Error> {
        Ok(self.property(ctx).await?.rent)
    }

    /// Indicator whether this `Property` may be booked.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Property.isBookable",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn is_bookable(&self, ctx: &Context) -> Result<bool, Error> {
        Ok(self.property(ctx).await?.is_bookable())
    }

    /// `DateTime` when this `Property` was listed.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "Property.createdAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn created_at(&self, ctx: &Context) -> Result<DateTime, Error> {
        Ok(self.property(ctx).await?.created_at.coerce())
    }
}

/// Unique identifier of a `Property`.
#[derive(
    Clone, Copy, Debug, Display, Eq, From, GraphQLScalar, Into, PartialEq,
)]
#[from(domain::property::Id)]
#[into(domain::property::Id)]
#[graphql(name = "PropertyId", transparent)]
pub struct Id(Uuid);

/// Title of a `Property`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "PropertyTitle",
    with = scalar::Via::<domain::property::Title>,
)]
pub struct Title(domain::property::Title);

/// Location of a `Property`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "PropertyLocation",
    with = scalar::Via::<domain::property::Location>,
)]
pub struct Location(domain::property::Location);

/// Description of a `Property`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "PropertyDescription",
    with = scalar::Via::<domain::property::Description>,
)]
pub struct Description(domain::property::Description);

/// Availability of a `Property` for a range of nights.
#[derive(Clone, Copy, Debug, GraphQLObject)]
#[graphql(name = "PropertyAvailability")]
pub struct Availability {
    /// Indicator whether no confirmed `Booking` overlaps the range.
    pub is_available: bool,

    /// Number of nights in the range.
    pub nights: i32,
}

pub mod list {
    //! Definitions related to the [`Property`] list.

    use derive_more::{AsRef, From, Into};
    use juniper::{graphql_object, GraphQLScalar};
    use service::{query, read, Query as _};

    use super::{Id, Property};
    use crate::{api::scalar, AsError, Context, Error};

    /// Cursor for the `Property` list.
    #[derive(AsRef, Clone, Copy, Debug, From, GraphQLScalar, Into)]
    #[from(Id, read::property::list::Cursor)]
    #[graphql(
        name = "PropertyListCursor",
        with = scalar::Via::<read::property::list::Cursor>,
    )]
    pub struct Cursor(pub read::property::list::Cursor);

    /// Edge in the [`Property`] list.
    #[derive(Clone, Copy, Debug, From, Into)]
    pub struct Edge(read::property::list::Edge);

    /// Edge in the `Property` list.
    #[graphql_object(name = "PropertyListEdge", context = Context)]
    impl Edge {
        /// Cursor of this `PropertyListEdge`.
        #[must_use]
        pub fn cursor(&self) -> Cursor {
            self.0.cursor.into()
        }

        /// Node of this `PropertyListEdge`.
        #[must_use]
        pub fn node(&self) -> Property {
            #[expect(
                unsafe_code,
                reason = "`Edge` loaded from repository guarantees \
                          `Property` existence"
            )]
            unsafe {
                Property::new_unchecked(self.0.node)
            }
        }
    }

    /// Connection of the [`Property`] list.
    #[derive(Clone, Debug)]
    pub struct Connection {
        /// Underlying [`read::property::list::Connection`].
        page: read::property::list::Connection,

        /// [`read::property::list::Filter`] the page was selected with.
        filter: read::property::list::Filter,
    }

    impl Connection {
        /// Creates a new [`Connection`] out of the provided page selected with
        /// the provided filter.
        #[must_use]
        pub fn new(
            page: read::property::list::Connection,
            filter: read::property::list::Filter,
        ) -> Self {
            Self { page, filter }
        }
    }

    /// Connection of the `Property` list.
    #[graphql_object(name = "PropertyListConnection", context = Context)]
    impl Connection {
        /// Edges of this `PropertyListConnection`.
        #[must_use]
        pub fn edges(&self) -> Vec<Edge> {
            self.page.edges.iter().copied().map(Into::into).collect()
        }

        /// Information about the page.
        #[must_use]
        pub fn page_info(&self) -> PageInfo {
            PageInfo {
                info: self.page.page_info(),
                filter: self.filter.clone(),
            }
        }
    }

    /// Information about a [`Connection`] page.
    #[derive(Clone, Debug)]
    pub struct PageInfo {
        /// Underlying [`read::property::list::PageInfo`].
        info: read::property::list::PageInfo,

        /// [`read::property::list::Filter`] to count the total with.
        filter: read::property::list::Filter,
    }

    /// Information about a `PropertyListConnection` page.
    #[graphql_object(name = "PropertyListPageInfo", context = Context)]
    impl PageInfo {
        /// Indicator whether there is a next page.
        #[must_use]
        pub fn has_next_page(&self) -> bool {
            self.info.has_next_page
        }

        /// Indicator whether there is a previous page.
        #[must_use]
        pub fn has_previous_page(&self) -> bool {
            self.info.has_previous_page
        }

        /// Start cursor of the page.
        #[must_use]
        pub fn start_cursor(&self) -> Option<Cursor> {
            self.info.start_cursor.map(Into::into)
        }

        /// End cursor of the page.
        #[must_use]
        pub fn end_cursor(&self) -> Option<Cursor> {
            self.info.end_cursor.map(Into::into)
        }

        /// Total count of the listed `Property`s.
        pub async fn total_count(&self, ctx: &Context) -> Result<i32, Error> {
            ctx.service()
                .execute(query::properties::TotalCount::by(self.filter.clone()))
                .await
                .map_err(AsError::into_error)
                .map_err(ctx.error())
                .map(Into::into)
        }
    }
}
