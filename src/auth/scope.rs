//! osu! OAuth scope names and the typed set the pipeline's scope guard checks.

// std
use std::collections::BTreeSet;
// self
use crate::_prelude::*;

/// A single osu! OAuth scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
	/// Read public data on behalf of the client.
	Public,
	/// Identify the user who owns the token.
	Identify,
	/// Read the user's friend list.
	FriendsRead,
	/// Create and edit forum posts.
	ForumWrite,
	/// Act as the delegate of a client owner.
	Delegate,
	/// Send chat messages.
	ChatWrite,
	/// Lazer-only endpoints; issued but not served by the stable API.
	Lazer,
}
impl Scope {
	/// Returns the wire name used in scope parameters and token responses.
	pub const fn as_str(self) -> &'static str {
		match self {
			Scope::Public => "public",
			Scope::Identify => "identify",
			Scope::FriendsRead => "friends.read",
			Scope::ForumWrite => "forum.write",
			Scope::Delegate => "delegate",
			Scope::ChatWrite => "chat.write",
			Scope::Lazer => "lazer",
		}
	}
}
impl FromStr for Scope {
	type Err = ScopeParseError;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value {
			"public" => Ok(Scope::Public),
			"identify" => Ok(Scope::Identify),
			"friends.read" => Ok(Scope::FriendsRead),
			"forum.write" => Ok(Scope::ForumWrite),
			"delegate" => Ok(Scope::Delegate),
			"chat.write" => Ok(Scope::ChatWrite),
			"lazer" => Ok(Scope::Lazer),
			_ => Err(ScopeParseError { value: value.to_owned() }),
		}
	}
}
impl Display for Scope {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Raised when a scope string does not name a known osu! scope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
#[error("`{value}` is not a known osu! scope.")]
pub struct ScopeParseError {
	/// The rejected scope string.
	pub value: String,
}

/// Ordered set of scopes attached to a credential or required by a call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeSet(BTreeSet<Scope>);
impl ScopeSet {
	/// Builds a set from the provided scopes.
	pub fn new(scopes: impl IntoIterator<Item = Scope>) -> Self {
		Self(scopes.into_iter().collect())
	}

	/// Parses a space-delimited scope string, as sent in OAuth `scope` parameters.
	pub fn parse(value: &str) -> Result<Self, ScopeParseError> {
		value.split_whitespace().map(Scope::from_str).collect::<Result<_, _>>().map(Self)
	}

	/// The guest set granted by a client-credentials exchange.
	pub fn public() -> Self {
		Self::new([Scope::Public])
	}

	/// Returns `true` when the set holds no scopes.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Number of scopes in the set.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when `scope` is present.
	pub fn contains(&self, scope: Scope) -> bool {
		self.0.contains(&scope)
	}

	/// Returns `true` when every scope in `required` is present.
	pub fn contains_all(&self, required: &ScopeSet) -> bool {
		required.0.is_subset(&self.0)
	}

	/// Returns `true` when at least one scope in `required` is present.
	pub fn intersects(&self, required: &ScopeSet) -> bool {
		!required.0.is_disjoint(&self.0)
	}

	/// Iterates the scopes in wire-name order.
	pub fn iter(&self) -> impl Iterator<Item = Scope> + '_ {
		self.0.iter().copied()
	}

	/// Joins the scopes into the space-delimited wire form.
	pub fn normalized(&self) -> String {
		let mut buf = String::new();

		for (idx, scope) in self.0.iter().enumerate() {
			if idx > 0 {
				buf.push(' ');
			}

			buf.push_str(scope.as_str());
		}

		buf
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}
impl FromIterator<Scope> for ScopeSet {
	fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
		Self::new(iter)
	}
}
