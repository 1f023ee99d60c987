use webster_dict::DictFile;
use webster_lookup::StoreExt;
use webster_types::Store;

const SOURCE: &str = "\
ABANDON; ABANDONED
To give up wholly. Etym: See Band.

1. To relinquish.

Defn: To forsake utterly.

BAND
n. A strip of cloth.

1. That which binds.

BEAR
n.

Defn: A large carnivorous animal.

BEAR
v. t.

Defn: To carry.
";

#[test]
fn dict_file_reproduces_the_parsed_map() {
    let wm = webster_parse::parse(SOURCE.as_bytes()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("webster.dict");
    webster_dict::create(&wm, &path).unwrap();

    let dict = DictFile::open(&path).unwrap();
    assert_eq!(dict.num_words(), wm.num_words());

    for (key, _) in wm.iter() {
        assert!(dict.has_word(key), "missing key {key}");
        let from_file = dict.get_words(key).unwrap().unwrap();
        let from_map = wm.get_words(key).unwrap().unwrap();
        assert_eq!(from_file, from_map, "entries differ under {key}");
    }

    dict.verify().unwrap();
}

#[test]
fn normalized_lookup_works_against_the_dict_file() {
    let wm = webster_parse::parse(SOURCE.as_bytes()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("webster.dict");
    webster_dict::create(&wm, &path).unwrap();
    let dict = DictFile::open(&path).unwrap();

    // Homographs come back in parse order.
    let bears = dict.lookup_word("  Bears! ").unwrap().unwrap();
    assert_eq!(bears.len(), 2);
    assert_eq!(bears[0].info, "n.");
    assert_eq!(bears[1].info, "v. t.");

    // Variants resolve to the entry they were filed with.
    let abandoned = dict.lookup_word("Abandoned").unwrap().unwrap();
    assert_eq!(abandoned[0].word, "abandon");
    assert_eq!(abandoned[0].referenced_words, vec!["band"]);

    assert!(dict.lookup_word("xylophone").unwrap().is_none());
}
