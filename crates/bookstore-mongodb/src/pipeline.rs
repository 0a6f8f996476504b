//! Aggregation pipelines issued by the runner

use bson::{doc, Document as BsonDocument};

/// Group by genre, average the price, highest average first
pub fn average_price_by_genre() -> Vec<BsonDocument> {
    vec![
        doc! {
            "$group": {
                "_id": "$genre",
                "averagePrice": { "$avg": "$price" },
            }
        },
        doc! { "$sort": { "averagePrice": -1 } },
    ]
}

/// Count books per author and keep the largest group
///
/// Equal counts are ordered by author name so the answer is stable.
pub fn top_author() -> Vec<BsonDocument> {
    vec![
        doc! {
            "$group": {
                "_id": "$author",
                "bookCount": { "$sum": 1 },
            }
        },
        doc! { "$sort": { "bookCount": -1, "_id": 1 } },
        doc! { "$limit": 1 },
    ]
}

/// Label each book with its decade ("2010s"), count per label, ascending
pub fn books_by_decade() -> Vec<BsonDocument> {
    vec![
        doc! {
            "$addFields": {
                "decade": {
                    "$concat": [
                        {
                            "$toString": {
                                "$multiply": [
                                    { "$floor": { "$divide": ["$publishedYear", 10] } },
                                    10
                                ]
                            }
                        },
                        "s"
                    ]
                }
            }
        },
        doc! {
            "$group": {
                "_id": "$decade",
                "count": { "$sum": 1 },
            }
        },
        doc! { "$sort": { "_id": 1 } },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage_names(pipeline: &[BsonDocument]) -> Vec<&str> {
        pipeline
            .iter()
            .filter_map(|stage| stage.keys().next().map(String::as_str))
            .collect()
    }

    #[test]
    fn test_average_price_by_genre_stages() {
        let pipeline = average_price_by_genre();
        assert_eq!(stage_names(&pipeline), vec!["$group", "$sort"]);

        let group = pipeline[0].get_document("$group").unwrap();
        assert_eq!(group.get_str("_id").unwrap(), "$genre");
        assert_eq!(
            group.get_document("averagePrice").unwrap(),
            &doc! { "$avg": "$price" }
        );
        assert_eq!(
            pipeline[1].get_document("$sort").unwrap(),
            &doc! { "averagePrice": -1 }
        );
    }

    #[test]
    fn test_top_author_limits_to_one() {
        let pipeline = top_author();
        assert_eq!(stage_names(&pipeline), vec!["$group", "$sort", "$limit"]);
        assert_eq!(pipeline[2].get_i32("$limit").unwrap(), 1);

        let sort = pipeline[1].get_document("$sort").unwrap();
        let keys: Vec<&String> = sort.keys().collect();
        assert_eq!(keys, vec!["bookCount", "_id"]);
    }

    #[test]
    fn test_books_by_decade_sorts_by_label() {
        let pipeline = books_by_decade();
        assert_eq!(stage_names(&pipeline), vec!["$addFields", "$group", "$sort"]);

        let group = pipeline[1].get_document("$group").unwrap();
        assert_eq!(group.get_str("_id").unwrap(), "$decade");
        assert_eq!(pipeline[2].get_document("$sort").unwrap(), &doc! { "_id": 1 });
    }
}
