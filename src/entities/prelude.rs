pub use super::access_tokens::Entity as AccessTokens;
pub use super::categories::Entity as Categories;
pub use super::comments::Entity as Comments;
pub use super::genre_titles::Entity as GenreTitles;
pub use super::genres::Entity as Genres;
pub use super::reviews::Entity as Reviews;
pub use super::titles::Entity as Titles;
pub use super::users::Entity as Users;
